//! Service-level tests against the in-memory store.
//!
//! Tests: ItemRepository / SearchResolver / LayoutService → InventoryStore
//!
//! Verifies:
//! - Location rules hold for every stored item
//! - Moves and bulk relocations write exactly one ledger entry per item
//! - Search matches, orders, paginates and enriches consistently whether
//!   project tags are matched in the store or in memory

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use roomstock_core::{CompartmentId, DomainError, ItemId, RoomId, StorageUnitId, UserId};
    use roomstock_inventory::{
        Compartment, Item, ItemListQuery, ItemPatch, ItemStatus, Location, LocationRef,
        NewCompartment, NewItem, NewRoom, NewStorageUnit, Placement, Room, SearchQuery,
        StorageUnit, StorageUnitType,
    };

    use crate::error::ServiceError;
    use crate::layout::LayoutService;
    use crate::repository::ItemRepository;
    use crate::search::SearchResolver;
    use crate::store::{InMemoryInventoryStore, InventoryStore, ItemListFilter};

    struct Fixture {
        store: Arc<InMemoryInventoryStore>,
        items: ItemRepository<InMemoryInventoryStore>,
        search: SearchResolver<InMemoryInventoryStore>,
        layout: LayoutService<InMemoryInventoryStore>,
        actor: UserId,
    }

    fn setup_with(store: InMemoryInventoryStore) -> Fixture {
        let store = Arc::new(store);
        Fixture {
            items: ItemRepository::new(store.clone()),
            search: SearchResolver::new(store.clone()),
            layout: LayoutService::new(store.clone()),
            store,
            actor: UserId::new(),
        }
    }

    fn setup() -> Fixture {
        setup_with(InMemoryInventoryStore::new())
    }

    /// Both project-matching strategies.
    fn both_modes() -> [Fixture; 2] {
        [
            setup_with(InMemoryInventoryStore::new()),
            setup_with(InMemoryInventoryStore::with_structured_substring_match()),
        ]
    }

    impl Fixture {
        async fn room(&self, name: &str, building: Option<&str>) -> Room {
            self.layout
                .create_room(NewRoom {
                    name: name.into(),
                    building: building.map(str::to_owned),
                    notes: None,
                })
                .await
                .unwrap()
        }

        async fn unit(&self, room_id: RoomId, label: &str) -> StorageUnit {
            self.layout
                .create_storage_unit(NewStorageUnit {
                    room_id,
                    label: label.into(),
                    kind: StorageUnitType::Cabinet,
                    placement: Placement::default(),
                    notes: None,
                })
                .await
                .unwrap()
        }

        async fn compartment(&self, storage_unit_id: StorageUnitId, name: &str) -> Compartment {
            self.layout
                .create_compartment(NewCompartment {
                    storage_unit_id,
                    name: name.into(),
                    index_order: 0,
                })
                .await
                .unwrap()
        }

        async fn item_in(&self, attrs: NewItem, location: LocationRef) -> Item {
            self.items.create(attrs, location).await.unwrap()
        }

        async fn named_in_unit(&self, name: &str, unit: StorageUnitId) -> Item {
            self.item_in(NewItem::named(name), LocationRef::storage_unit(unit)).await
        }

        async fn all_items(&self, status: ItemStatus) -> Vec<Item> {
            self.store
                .list_items(
                    ItemListFilter {
                        status,
                        ..Default::default()
                    },
                    roomstock_inventory::Window::ALL,
                )
                .await
                .unwrap()
                .items
        }

        /// Every stored item satisfies: deleted, or exactly one location
        /// reference that resolves to an existing row.
        async fn assert_locations_well_formed(&self) {
            for item in self.all_items(ItemStatus::Active).await {
                let exists = match item.location {
                    Location::StorageUnit(id) => self.store.get_storage_unit(id).await.unwrap().is_some(),
                    Location::Compartment(id) => self.store.get_compartment(id).await.unwrap().is_some(),
                };
                assert!(exists, "active item {} points at a missing location", item.id);
                assert!(item.deleted_at.is_none());
            }
            for item in self.all_items(ItemStatus::Deleted).await {
                assert!(item.deleted_at.is_some());
            }
        }
    }

    fn domain(err: ServiceError) -> DomainError {
        match err {
            ServiceError::Domain(e) => e,
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    fn names(hits: &[roomstock_inventory::SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.item.name.as_str()).collect()
    }

    #[tokio::test]
    async fn create_rejects_malformed_and_dangling_locations() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "Cabinet A").await;
        let compartment = fx.compartment(unit.id, "Drawer 1").await;

        let both = LocationRef::new(Some(unit.id), Some(compartment.id));
        let err = fx.items.create(NewItem::named("x"), both).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidLocation(_)));

        let err = fx
            .items
            .create(NewItem::named("x"), LocationRef::default())
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidLocation(_)));

        let err = fx
            .items
            .create(NewItem::named("x"), LocationRef::compartment(CompartmentId::new()))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));

        let mut negative = NewItem::named("x");
        negative.quantity = -3;
        let err = fx
            .items
            .create(negative, LocationRef::storage_unit(unit.id))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Validation(_)));

        assert!(fx.all_items(ItemStatus::Active).await.is_empty());
    }

    #[tokio::test]
    async fn create_writes_no_ledger_entry() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "Cabinet A").await;
        let item = fx.named_in_unit("Scope", unit.id).await;

        assert_eq!(item.status, ItemStatus::Active);
        assert!(fx.items.history(item.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn move_records_previous_and_requested_location() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "Cabinet A").await;
        let compartment = fx.compartment(unit.id, "Drawer 1").await;
        let item = fx.named_in_unit("Scope", unit.id).await;

        let moved = fx
            .items
            .move_item(
                item.id,
                LocationRef::compartment(compartment.id),
                fx.actor,
                Some("tidy up".into()),
            )
            .await
            .unwrap();
        assert_eq!(moved.location, Location::Compartment(compartment.id));

        let history = fx.items.history(item.id).await.unwrap();
        assert_eq!(history.len(), 1);
        let entry = &history[0];
        assert_eq!(entry.source(), LocationRef::storage_unit(unit.id));
        assert_eq!(entry.destination(), LocationRef::compartment(compartment.id));
        assert_eq!(entry.user_id, Some(fx.actor));
        assert_eq!(entry.reason.as_deref(), Some("tidy up"));
        fx.assert_locations_well_formed().await;
    }

    #[tokio::test]
    async fn failed_move_changes_nothing() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "Cabinet A").await;
        let item = fx.named_in_unit("Scope", unit.id).await;

        let err = fx
            .items
            .move_item(item.id, LocationRef::storage_unit(StorageUnitId::new()), fx.actor, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));

        let err = fx
            .items
            .move_item(ItemId::new(), LocationRef::storage_unit(unit.id), fx.actor, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));

        assert_eq!(fx.items.get(item.id).await.unwrap().location, item.location);
        assert!(fx.items.history(item.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_is_newest_first_with_one_entry_per_move() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let a = fx.unit(room.id, "A").await;
        let b = fx.unit(room.id, "B").await;
        let item = fx.named_in_unit("Scope", a.id).await;

        let hops = [b.id, a.id, b.id, b.id];
        for unit in hops {
            fx.items
                .move_item(item.id, LocationRef::storage_unit(unit), fx.actor, None)
                .await
                .unwrap();
        }

        let history = fx.items.history(item.id).await.unwrap();
        assert_eq!(history.len(), hops.len());
        let destinations: Vec<_> = history.iter().map(|m| m.to_storage_unit_id).collect();
        let expected: Vec<_> = hops.iter().rev().map(|id| Some(*id)).collect();
        assert_eq!(destinations, expected);
        for pair in history.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
            // Each move starts where the previous one ended.
            assert_eq!(pair[0].source(), pair[1].destination());
        }
    }

    #[tokio::test]
    async fn history_of_missing_item_is_not_found() {
        let fx = setup();
        let err = fx.items.history(ItemId::new()).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_moves_of_one_item_chain_cleanly() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let a = fx.unit(room.id, "A").await;
        let b = fx.unit(room.id, "B").await;
        let c = fx.unit(room.id, "C").await;
        let item = fx.named_in_unit("Scope", a.id).await;

        let (first, second) = tokio::join!(
            fx.items.move_item(item.id, LocationRef::storage_unit(b.id), fx.actor, None),
            fx.items.move_item(item.id, LocationRef::storage_unit(c.id), fx.actor, None),
        );
        first.unwrap();
        second.unwrap();

        let history = fx.items.history(item.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].source(), LocationRef::storage_unit(a.id));
        assert_eq!(history[0].source(), history[1].destination());
        let current = fx.items.get(item.id).await.unwrap();
        assert_eq!(LocationRef::from(current.location), history[0].destination());
    }

    #[tokio::test]
    async fn soft_delete_keeps_location_and_blocks_moves() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let a = fx.unit(room.id, "A").await;
        let b = fx.unit(room.id, "B").await;
        let item = fx.named_in_unit("Scope", a.id).await;

        let deleted = fx.items.soft_delete(item.id).await.unwrap();
        assert_eq!(deleted.status, ItemStatus::Deleted);
        assert!(deleted.deleted_at.is_some());
        assert_eq!(deleted.location, Location::StorageUnit(a.id));

        let err = fx
            .items
            .move_item(item.id, LocationRef::storage_unit(b.id), fx.actor, None)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidLocation(_)));

        let err = fx.items.soft_delete(ItemId::new()).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));
        fx.assert_locations_well_formed().await;
    }

    #[tokio::test]
    async fn update_applies_only_present_fields() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "A").await;
        let mut attrs = NewItem::named("Scope");
        attrs.description = Some("bench scope".into());
        attrs.owned_by = Some("EE lab".into());
        let item = fx.item_in(attrs, LocationRef::storage_unit(unit.id)).await;

        let patch = ItemPatch {
            description: Some(None),
            quantity: Some(4),
            ..Default::default()
        };
        let updated = fx.items.update(item.id, patch).await.unwrap();
        assert_eq!(updated.description, None);
        assert_eq!(updated.owned_by.as_deref(), Some("EE lab"));
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.location, item.location);
        assert_eq!(updated.status, ItemStatus::Active);

        let err = fx
            .items
            .update(item.id, ItemPatch { quantity: Some(-1), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Validation(_)));

        let err = fx.items.update(ItemId::new(), ItemPatch::default()).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn bulk_relocate_moves_direct_active_items_only() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let source = fx.unit(room.id, "Source").await;
        let destination = fx.unit(room.id, "Destination").await;
        let drawer = fx.compartment(source.id, "Drawer").await;

        let a = fx.named_in_unit("A", source.id).await;
        let b = fx.named_in_unit("B", source.id).await;
        let c = fx.named_in_unit("C", source.id).await;
        let gone = fx.named_in_unit("Gone", source.id).await;
        fx.items.soft_delete(gone.id).await.unwrap();
        let nested = fx
            .item_in(NewItem::named("Nested"), LocationRef::compartment(drawer.id))
            .await;

        let moved = fx
            .items
            .bulk_relocate(source.id, destination.id, Some("reorg".into()), fx.actor)
            .await
            .unwrap();
        assert_eq!(moved, 3);

        for item in [&a, &b, &c] {
            let history = fx.items.history(item.id).await.unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].from_storage_unit_id, Some(source.id));
            assert_eq!(history[0].to_storage_unit_id, Some(destination.id));
            assert_eq!(history[0].reason.as_deref(), Some("reorg"));
            assert_eq!(
                fx.items.get(item.id).await.unwrap().location,
                Location::StorageUnit(destination.id)
            );
        }
        assert_eq!(fx.items.get(gone.id).await.unwrap().location, Location::StorageUnit(source.id));
        assert_eq!(
            fx.items.get(nested.id).await.unwrap().location,
            Location::Compartment(drawer.id)
        );
        fx.assert_locations_well_formed().await;
    }

    #[tokio::test]
    async fn bulk_relocate_rejects_same_or_missing_units() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "Only").await;
        let item = fx.named_in_unit("A", unit.id).await;

        let err = fx
            .items
            .bulk_relocate(unit.id, unit.id, None, fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidLocation(_)));

        let err = fx
            .items
            .bulk_relocate(unit.id, StorageUnitId::new(), None, fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));

        let err = fx
            .items
            .bulk_relocate(StorageUnitId::new(), unit.id, None, fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));

        assert!(fx.items.history(item.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulk_relocate_from_empty_unit_is_a_no_op() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let empty = fx.unit(room.id, "Empty").await;
        let other = fx.unit(room.id, "Other").await;

        let moved = fx
            .items
            .bulk_relocate(empty.id, other.id, None, fx.actor)
            .await
            .unwrap();
        assert_eq!(moved, 0);
    }

    #[tokio::test]
    async fn batch_operations_are_all_or_nothing() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let a_unit = fx.unit(room.id, "A").await;
        let b_unit = fx.unit(room.id, "B").await;
        let one = fx.named_in_unit("One", a_unit.id).await;
        let two = fx.named_in_unit("Two", a_unit.id).await;

        let err = fx
            .items
            .batch_move(&[one.id, ItemId::new()], b_unit.id, None, fx.actor)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));
        assert!(fx.items.history(one.id).await.unwrap().is_empty());
        assert_eq!(fx.items.get(one.id).await.unwrap().location, Location::StorageUnit(a_unit.id));

        let moved = fx
            .items
            .batch_move(&[one.id, two.id], b_unit.id, None, fx.actor)
            .await
            .unwrap();
        assert_eq!(moved, 2);
        assert_eq!(fx.items.history(two.id).await.unwrap().len(), 1);

        let err = fx
            .items
            .batch_soft_delete(&[one.id, ItemId::new()])
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));
        assert!(fx.items.get(one.id).await.unwrap().is_active());

        let deleted = fx.items.batch_soft_delete(&[one.id, two.id]).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(fx.all_items(ItemStatus::Active).await.is_empty());

        let err = fx.items.batch_soft_delete(&[]).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_by_exact_placement() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "A").await;
        let drawer = fx.compartment(unit.id, "Drawer").await;
        fx.named_in_unit("Direct", unit.id).await;
        fx.item_in(NewItem::named("Nested"), LocationRef::compartment(drawer.id))
            .await;

        let direct = fx
            .items
            .list(&ItemListQuery {
                storage_unit_id: Some(unit.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(direct.total, 1);
        assert_eq!(direct.items[0].name, "Direct");

        let nested = fx
            .items
            .list(&ItemListQuery {
                compartment_id: Some(drawer.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(nested.items[0].name, "Nested");
    }

    #[tokio::test]
    async fn list_without_limit_returns_every_item() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "A").await;
        for n in 0..60 {
            fx.named_in_unit(&format!("Part {n:02}"), unit.id).await;
        }

        let all = fx
            .items
            .list(&ItemListQuery {
                storage_unit_id: Some(unit.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.total, 60);
        assert_eq!(all.items.len(), 60);
        assert_eq!(all.items[59].name, "Part 59");

        let paged = fx
            .items
            .list(&ItemListQuery {
                storage_unit_id: Some(unit.id),
                limit: Some(25),
                offset: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(paged.total, 60);
        assert_eq!(paged.items.len(), 10);
        assert_eq!(paged.items[0].name, "Part 50");
    }

    #[tokio::test]
    async fn search_without_query_returns_active_items_by_name() {
        for fx in both_modes() {
            let room = fx.room("Lab", None).await;
            let unit = fx.unit(room.id, "A").await;
            for name in ["Charlie", "alpha", "Bravo", "Alpha"] {
                fx.named_in_unit(name, unit.id).await;
            }
            let doomed = fx.named_in_unit("Aardvark", unit.id).await;
            fx.items.soft_delete(doomed.id).await.unwrap();

            let page = fx
                .search
                .search(&SearchQuery {
                    limit: 50,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(page.total, 4);
            assert_eq!(names(&page.items), vec!["Alpha", "Bravo", "Charlie", "alpha"]);

            let deleted = fx
                .search
                .search(&SearchQuery {
                    status: ItemStatus::Deleted,
                    limit: 50,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(names(&deleted.items), vec!["Aardvark"]);
        }
    }

    #[tokio::test]
    async fn search_ties_keep_insertion_order() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "A").await;
        let first = fx.named_in_unit("Same", unit.id).await;
        let second = fx.named_in_unit("Same", unit.id).await;

        let page = fx.search.search(&SearchQuery::text("same")).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|h| h.item.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn search_matches_catalog_numbers_case_insensitively() {
        for fx in both_modes() {
            let room = fx.room("Lab", None).await;
            let unit = fx.unit(room.id, "Cabinet").await;

            let mut one = NewItem::named("Item 1");
            one.unit_catalog_number = Some("ABC-123".into());
            let mut two = NewItem::named("Item 2");
            two.unit_catalog_number = Some("XYZ-456".into());
            let mut three = NewItem::named("Item 3");
            three.catalog_number = Some("ABC-789".into());
            for attrs in [one, two, three] {
                fx.item_in(attrs, LocationRef::storage_unit(unit.id)).await;
            }

            let page = fx.search.search(&SearchQuery::text("abc")).await.unwrap();
            assert_eq!(page.total, 2);
            assert_eq!(names(&page.items), vec!["Item 1", "Item 3"]);
        }
    }

    #[tokio::test]
    async fn search_matches_storage_unit_label_through_compartments() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "Zeta Cabinet").await;
        let drawer = fx.compartment(unit.id, "Drawer").await;
        fx.item_in(NewItem::named("Nested"), LocationRef::compartment(drawer.id))
            .await;
        fx.named_in_unit("Direct", unit.id).await;

        let page = fx.search.search(&SearchQuery::text("ZETA")).await.unwrap();
        assert_eq!(names(&page.items), vec!["Direct", "Nested"]);
    }

    #[tokio::test]
    async fn project_tags_match_in_both_modes_and_count_before_paging() {
        for fx in both_modes() {
            let room = fx.room("Lab", None).await;
            let unit = fx.unit(room.id, "Cabinet").await;

            let mut tagged = NewItem::named("B tagged");
            tagged.projects = vec!["Apollo".into(), "Gemini".into()];
            fx.item_in(tagged, LocationRef::storage_unit(unit.id)).await;
            let mut named = NewItem::named("A gemini-compatible");
            named.projects = vec!["Mercury".into()];
            fx.item_in(named, LocationRef::storage_unit(unit.id)).await;
            fx.named_in_unit("C unrelated", unit.id).await;

            let all = fx.search.search(&SearchQuery::text("gem")).await.unwrap();
            assert_eq!(all.total, 2, "structured={}", fx.store.supports_structured_substring_match());
            assert_eq!(names(&all.items), vec!["A gemini-compatible", "B tagged"]);

            let mut second_page = SearchQuery::text("gem");
            second_page.limit = 1;
            second_page.offset = 1;
            let paged = fx.search.search(&second_page).await.unwrap();
            assert_eq!(paged.total, 2);
            assert_eq!(names(&paged.items), vec!["B tagged"]);
        }
    }

    #[tokio::test]
    async fn project_fallback_respects_status_and_scope() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let inside = fx.unit(room.id, "Inside").await;
        let other_room = fx.room("Annex", None).await;
        let outside = fx.unit(other_room.id, "Outside").await;

        let mut a = NewItem::named("In scope");
        a.projects = vec!["Orion".into()];
        fx.item_in(a, LocationRef::storage_unit(inside.id)).await;
        let mut b = NewItem::named("Other room");
        b.projects = vec!["Orion".into()];
        fx.item_in(b, LocationRef::storage_unit(outside.id)).await;
        let mut c = NewItem::named("Deleted");
        c.projects = vec!["Orion".into()];
        let c = fx.item_in(c, LocationRef::storage_unit(inside.id)).await;
        fx.items.soft_delete(c.id).await.unwrap();

        let mut query = SearchQuery::text("orion");
        query.room_id = Some(room.id);
        let page = fx.search.search(&query).await.unwrap();
        assert_eq!(names(&page.items), vec!["In scope"]);
    }

    #[tokio::test]
    async fn unit_and_room_filters_reach_compartment_items() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "A").await;
        let drawer = fx.compartment(unit.id, "Drawer").await;
        let other_room = fx.room("Annex", None).await;
        let elsewhere = fx.unit(other_room.id, "B").await;

        fx.named_in_unit("Direct", unit.id).await;
        fx.item_in(NewItem::named("Nested"), LocationRef::compartment(drawer.id))
            .await;
        fx.named_in_unit("Elsewhere", elsewhere.id).await;

        let by_unit = fx
            .search
            .search(&SearchQuery {
                storage_unit_id: Some(unit.id),
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(names(&by_unit.items), vec!["Direct", "Nested"]);

        let by_room = fx
            .search
            .search(&SearchQuery {
                room_id: Some(room.id),
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_room.total, 2);
    }

    #[tokio::test]
    async fn search_hits_carry_location_paths() {
        let fx = setup();
        let r1 = fx.room("R1", None).await;
        let cabinet = fx.unit(r1.id, "Cabinet A").await;
        fx.named_in_unit("Direct", cabinet.id).await;

        let bx = fx.room("R1", Some("Bldg X")).await;
        let other_cabinet = fx.unit(bx.id, "Cabinet A").await;
        let drawer = fx.compartment(other_cabinet.id, "Drawer 1").await;
        fx.item_in(NewItem::named("Nested"), LocationRef::compartment(drawer.id))
            .await;

        let page = fx
            .search
            .search(&SearchQuery {
                limit: 50,
                ..Default::default()
            })
            .await
            .unwrap();
        let direct = &page.items[0];
        assert_eq!(direct.location_path, "R1 > Cabinet A");
        assert_eq!(direct.room_id, Some(r1.id));
        assert_eq!(direct.storage_unit_type, Some(StorageUnitType::Cabinet));
        assert_eq!(direct.compartment_id, None);

        let nested = &page.items[1];
        assert_eq!(nested.location_path, "Bldg X - R1 > Cabinet A > Drawer 1");
        assert_eq!(nested.room_building.as_deref(), Some("Bldg X"));
        assert_eq!(nested.storage_unit_id, Some(other_cabinet.id));
        assert_eq!(nested.compartment_name.as_deref(), Some("Drawer 1"));
    }

    #[tokio::test]
    async fn search_rejects_out_of_range_limits() {
        let fx = setup();
        let mut query = SearchQuery::text("x");
        query.limit = 0;
        assert!(matches!(domain(fx.search.search(&query).await.unwrap_err()), DomainError::Validation(_)));
        query.limit = 201;
        assert!(matches!(domain(fx.search.search(&query).await.unwrap_err()), DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn deleting_unit_is_blocked_by_active_items_and_purges_deleted_ones() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "A").await;
        let drawer = fx.compartment(unit.id, "Drawer").await;
        let other = fx.unit(room.id, "B").await;

        let nested = fx
            .item_in(NewItem::named("Nested"), LocationRef::compartment(drawer.id))
            .await;
        let err = fx.layout.delete_storage_unit(unit.id).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidLocation(_)));

        let traveller = fx.named_in_unit("Traveller", unit.id).await;
        fx.items
            .move_item(traveller.id, LocationRef::storage_unit(other.id), fx.actor, None)
            .await
            .unwrap();
        fx.items.soft_delete(nested.id).await.unwrap();
        let leftover = fx.named_in_unit("Leftover", unit.id).await;
        fx.items.soft_delete(leftover.id).await.unwrap();

        let purged = fx.layout.delete_storage_unit(unit.id).await.unwrap();
        assert_eq!(purged, 2);
        assert!(fx.items.get(nested.id).await.is_err());
        assert!(fx.store.get_compartment(drawer.id).await.unwrap().is_none());

        // The ledger still mentions the deleted unit.
        let history = fx.items.history(traveller.id).await.unwrap();
        assert_eq!(history[0].from_storage_unit_id, Some(unit.id));
        fx.assert_locations_well_formed().await;

        let err = fx.layout.delete_storage_unit(unit.id).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_room_and_compartment_follow_the_same_rule() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        let unit = fx.unit(room.id, "A").await;
        let drawer = fx.compartment(unit.id, "Drawer").await;
        let item = fx
            .item_in(NewItem::named("Nested"), LocationRef::compartment(drawer.id))
            .await;

        assert!(matches!(
            domain(fx.layout.delete_compartment(drawer.id).await.unwrap_err()),
            DomainError::InvalidLocation(_)
        ));
        assert!(matches!(
            domain(fx.layout.delete_room(room.id).await.unwrap_err()),
            DomainError::InvalidLocation(_)
        ));

        fx.items.soft_delete(item.id).await.unwrap();
        assert_eq!(fx.layout.delete_room(room.id).await.unwrap(), 1);
        assert!(fx.layout.list_storage_units(None).await.unwrap().is_empty());
        assert!(fx.layout.list_compartments(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn layout_creation_requires_existing_parents() {
        let fx = setup();
        let err = fx
            .layout
            .create_storage_unit(NewStorageUnit {
                room_id: RoomId::new(),
                label: "Orphan".into(),
                kind: StorageUnitType::Shelf,
                placement: Placement::default(),
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));

        let err = fx
            .layout
            .create_compartment(NewCompartment {
                storage_unit_id: StorageUnitId::new(),
                name: "Orphan".into(),
                index_order: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn layout_lists_are_ordered() {
        let fx = setup();
        let room = fx.room("Lab", None).await;
        fx.unit(room.id, "Shelf").await;
        let cabinet = fx.unit(room.id, "Cabinet").await;
        for (name, order) in [("Bottom", 2), ("Top", 0), ("Middle", 1)] {
            fx.layout
                .create_compartment(NewCompartment {
                    storage_unit_id: cabinet.id,
                    name: name.into(),
                    index_order: order,
                })
                .await
                .unwrap();
        }

        let labels: Vec<_> = fx
            .layout
            .list_storage_units(Some(room.id))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.label)
            .collect();
        assert_eq!(labels, vec!["Cabinet", "Shelf"]);

        let compartments: Vec<_> = fx
            .layout
            .list_compartments(Some(cabinet.id))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(compartments, vec!["Top", "Middle", "Bottom"]);
    }
}
