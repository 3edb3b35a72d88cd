use thiserror::Error;

use roomstock_core::DomainError;

use crate::store::StoreError;

/// Failure of an inventory service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
