//! Existence half of the location check. The shape half lives in
//! [`LocationRef::into_location`].

use roomstock_core::DomainError;
use roomstock_inventory::{Location, LocationRef};

use crate::error::ServiceResult;
use crate::store::StoreTx;

/// Validate a proposed location inside `tx`.
///
/// Both/neither references set → `InvalidLocation`; a reference to a
/// missing unit or compartment → `NotFound`. Reads only.
pub async fn check_location<T: StoreTx>(tx: &mut T, proposed: LocationRef) -> ServiceResult<Location> {
    let location = proposed.into_location()?;
    match location {
        Location::StorageUnit(id) => {
            if tx.get_storage_unit(id).await?.is_none() {
                return Err(DomainError::not_found(format!("storage unit {id}")).into());
            }
        }
        Location::Compartment(id) => {
            if tx.get_compartment(id).await?.is_none() {
                return Err(DomainError::not_found(format!("compartment {id}")).into());
            }
        }
    }
    Ok(location)
}
