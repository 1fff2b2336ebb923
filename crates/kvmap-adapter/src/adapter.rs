//! The adapter facade.
//!
//! [`Adapter`] owns a store client, the collection registry and the
//! configuration. Plain calls run against the base client; calls made
//! inside [`Adapter::transaction`] run against the open transaction.

use std::sync::Arc;

use kvmap_mapper::{Entity, MappedCollection, MapperRegistry};
use kvmap_store::{StoreClient, TransactionOptions};
use kvmap_types::EntityId;
use tracing::{debug, info, info_span, warn};

use crate::command::Command;
use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::query::Query;
use crate::session::Session;

/// Data-mapper adapter over one schemaless key-value store.
pub struct Adapter {
    store: Arc<dyn StoreClient>,
    registry: MapperRegistry,
    config: AdapterConfig,
}

impl Adapter {
    pub fn builder(store: Arc<dyn StoreClient>) -> AdapterBuilder {
        AdapterBuilder::new(store)
    }

    pub fn new(
        store: Arc<dyn StoreClient>,
        registry: MapperRegistry,
        config: AdapterConfig,
    ) -> AdapterResult<Self> {
        config.validate()?;
        info!(collections = registry.len(), strict_update = config.strict_update, "adapter ready");
        Ok(Self {
            store,
            registry,
            config,
        })
    }

    pub fn store(&self) -> &dyn StoreClient {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &MapperRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Operations against the base (non-transactional) client.
    pub fn session(&self) -> Session<'_> {
        Session::new(self.store.as_ref(), &self.registry, &self.config)
    }

    /// Run `body` inside a store transaction.
    ///
    /// Commits when `body` returns `Ok`; rolls back and returns the body's
    /// error otherwise. A panic in `body` drops the open transaction, which
    /// also rolls it back. A failed commit is reported as
    /// [`AdapterError::Transaction`].
    pub fn transaction<T, F>(&self, options: TransactionOptions, body: F) -> AdapterResult<T>
    where
        F: FnOnce(&Session<'_>) -> AdapterResult<T>,
    {
        let tx = self.store.begin(options).map_err(AdapterError::Transaction)?;
        let span = info_span!("transaction", id = %tx.id(), read_only = options.read_only);
        let _guard = span.enter();
        debug!("transaction started");

        let result = {
            let session = Session::new(tx.as_client(), &self.registry, &self.config);
            body(&session)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(AdapterError::Transaction)?;
                info!("transaction committed");
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "rolling back transaction");
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Release the store connection.
    pub fn shutdown(self) -> AdapterResult<()> {
        self.store.close().map_err(AdapterError::write("shutdown"))?;
        info!("adapter shut down");
        Ok(())
    }

    // ---- Delegated to the base session ----

    pub fn command<E: Entity>(&self, symbol: &str) -> AdapterResult<Command<'_, E>> {
        self.session().command(symbol)
    }

    pub fn query<E: Entity>(&self, symbol: &str) -> AdapterResult<Query<'_, E>> {
        self.session().query(symbol)
    }

    pub fn query_with<'s, E, F>(&'s self, symbol: &str, configure: F) -> AdapterResult<Query<'s, E>>
    where
        E: Entity,
        F: FnOnce(Query<'s, E>) -> Query<'s, E>,
    {
        self.session().query_with(symbol, configure)
    }

    pub fn create<E: Entity>(&self, symbol: &str, entity: E) -> AdapterResult<E> {
        self.session().create(symbol, entity)
    }

    pub fn update<E: Entity>(&self, symbol: &str, entity: E) -> AdapterResult<E> {
        self.session().update(symbol, entity)
    }

    pub fn persist<E: Entity>(&self, symbol: &str, entity: E) -> AdapterResult<E> {
        self.session().persist(symbol, entity)
    }

    pub fn find<E: Entity>(&self, symbol: &str, id: &EntityId) -> AdapterResult<Option<E>> {
        self.session().find(symbol, id)
    }

    pub fn first<E: Entity>(&self, symbol: &str) -> AdapterResult<Option<E>> {
        self.session().first(symbol)
    }

    pub fn last<E: Entity>(&self, symbol: &str) -> AdapterResult<Option<E>> {
        self.session().last(symbol)
    }

    pub fn delete<E: Entity>(&self, symbol: &str, entity: &E) -> AdapterResult<()> {
        self.session().delete(symbol, entity)
    }

    pub fn clear(&self, symbol: &str) -> AdapterResult<()> {
        self.session().clear(symbol)
    }

    pub fn fetch<E: Entity>(&self, symbol: &str, ids: &[EntityId]) -> AdapterResult<Vec<E>> {
        self.session().fetch(symbol, ids)
    }

    pub fn execute(&self, statement: &str) -> AdapterResult<()> {
        self.session().execute(statement)
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`Adapter`].
pub struct AdapterBuilder {
    store: Arc<dyn StoreClient>,
    registry: MapperRegistry,
    config: AdapterConfig,
}

impl AdapterBuilder {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self {
            store,
            registry: MapperRegistry::new(),
            config: AdapterConfig::default(),
        }
    }

    /// Register a collection. Fails on a duplicate symbol or invalid kind.
    pub fn register<E, M>(mut self, symbol: &str, mapping: M) -> AdapterResult<Self>
    where
        E: Entity,
        M: MappedCollection<E> + 'static,
    {
        self.registry.register::<E, M>(symbol, mapping)?;
        Ok(self)
    }

    /// Use a prepared registry, replacing any registrations made so far.
    pub fn registry(mut self, registry: MapperRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> AdapterResult<Adapter> {
        Adapter::new(self.store, self.registry, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{adapter, adapter_with, Widget, WIDGETS};
    use kvmap_mapper::{MappingError, SerdeMapping};
    use kvmap_store::{FilterOp, InMemoryDatastore, StoreError};
    use kvmap_types::{PropertyBag, Value};
    use proptest::prelude::*;

    // ---- Create / find ----

    #[test]
    fn widgets_scenario() {
        let (store, adapter) = adapter();

        let a = adapter.create(WIDGETS, Widget::new("A", 1)).unwrap();
        let b = adapter.create(WIDGETS, Widget::new("B", 2)).unwrap();
        let c = adapter.create(WIDGETS, Widget::new("C", 3)).unwrap();
        assert!(a.id.is_some());
        assert!(b.id.is_some());
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert_eq!(store.len(), 3);

        let found: Widget = adapter.find(WIDGETS, a.id.as_ref().unwrap()).unwrap().unwrap();
        assert_eq!(found, a);

        let first: Widget = adapter.first(WIDGETS).unwrap().unwrap();
        let last: Widget = adapter.last(WIDGETS).unwrap().unwrap();
        assert_eq!(first, a);
        assert_eq!(last, c);

        let mut renamed = a.clone();
        renamed.name = "A2".into();
        adapter.update(WIDGETS, renamed.clone()).unwrap();
        let found: Widget = adapter.find(WIDGETS, a.id.as_ref().unwrap()).unwrap().unwrap();
        assert_eq!(found.name, "A2");

        adapter.delete(WIDGETS, &renamed).unwrap();
        assert!(adapter
            .find::<Widget>(WIDGETS, a.id.as_ref().unwrap())
            .unwrap()
            .is_none());
        assert_eq!(store.len(), 2);
        assert_eq!(adapter.first::<Widget>(WIDGETS).unwrap(), Some(b));
    }

    #[test]
    fn create_with_explicit_name() {
        let (_, adapter) = adapter();
        let mut w = Widget::new("named", 3);
        w.id = Some(EntityId::from("w-1"));
        let created = adapter.create(WIDGETS, w).unwrap();
        assert_eq!(created.id, Some(EntityId::from("w-1")));

        let found: Widget = adapter.find(WIDGETS, &EntityId::from("w-1")).unwrap().unwrap();
        assert_eq!(found.name, "named");
    }

    #[test]
    fn find_missing_is_none() {
        let (_, adapter) = adapter();
        assert!(adapter
            .find::<Widget>(WIDGETS, &EntityId::Id(99))
            .unwrap()
            .is_none());
    }

    #[test]
    fn first_and_last_of_empty_collection() {
        let (_, adapter) = adapter();
        assert!(adapter.first::<Widget>(WIDGETS).unwrap().is_none());
        assert!(adapter.last::<Widget>(WIDGETS).unwrap().is_none());
    }

    #[test]
    fn numeric_ids_order_before_names() {
        let (_, adapter) = adapter();
        for name in ["zeta", "alpha"] {
            let mut w = Widget::new(name, 0);
            w.id = Some(EntityId::from(name));
            adapter.create(WIDGETS, w).unwrap();
        }
        let low = adapter.create(WIDGETS, Widget::new("low", 1)).unwrap();
        adapter.create(WIDGETS, Widget::new("high", 2)).unwrap();

        let first: Widget = adapter.first(WIDGETS).unwrap().unwrap();
        let last: Widget = adapter.last(WIDGETS).unwrap().unwrap();
        assert_eq!(first, low);
        assert_eq!(last.id, Some(EntityId::from("zeta")));
    }

    #[test]
    fn first_and_last_ignore_other_kinds() {
        let (store, adapter) = adapter();
        let w = adapter.create(WIDGETS, Widget::new("only", 1)).unwrap();
        store
            .save(
                &store.key("Gadget", Some(EntityId::Id(1_000))),
                &PropertyBag::new().with("name", "g"),
            )
            .unwrap();
        assert_eq!(adapter.last::<Widget>(WIDGETS).unwrap(), Some(w.clone()));
        assert_eq!(adapter.first::<Widget>(WIDGETS).unwrap(), Some(w));
    }

    #[test]
    fn repeated_reads_hit_the_store() {
        let (store, adapter) = adapter();
        let w = adapter.create(WIDGETS, Widget::new("A", 1)).unwrap();
        let id = w.id.clone().unwrap();

        let before = store.queries_run();
        adapter.first::<Widget>(WIDGETS).unwrap();
        adapter.first::<Widget>(WIDGETS).unwrap();
        assert_eq!(store.queries_run(), before + 2);

        // Out-of-band change is visible to the next find.
        store
            .save(&store.key("Widget", Some(id.clone())), &PropertyBag::new().with("name", "B"))
            .unwrap();
        let found: Widget = adapter.find(WIDGETS, &id).unwrap().unwrap();
        assert_eq!(found.name, "B");
    }

    // ---- Update / persist / delete ----

    #[test]
    fn update_requires_identity() {
        let (_, adapter) = adapter();
        let err = adapter.update(WIDGETS, Widget::new("A", 1)).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::IdentityRequired { operation: "update", .. }
        ));
    }

    #[test]
    fn delete_requires_identity() {
        let (_, adapter) = adapter();
        let err = adapter.delete(WIDGETS, &Widget::new("A", 1)).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::IdentityRequired { operation: "delete", .. }
        ));
    }

    #[test]
    fn update_of_missing_record_creates_it() {
        let (store, adapter) = adapter();
        let mut w = Widget::new("ghost", 1);
        w.id = Some(EntityId::Id(42));
        adapter.update(WIDGETS, w).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn strict_update_of_missing_record_fails() {
        let config = AdapterConfig {
            strict_update: true,
            ..Default::default()
        };
        let (store, adapter) = adapter_with(config);
        let mut w = Widget::new("ghost", 1);
        w.id = Some(EntityId::Id(42));
        let err = adapter.update(WIDGETS, w).unwrap_err();
        assert!(matches!(err, AdapterError::NotFound(_)));
        assert!(store.is_empty());

        let created = adapter.create(WIDGETS, Widget::new("real", 1)).unwrap();
        let mut changed = created.clone();
        changed.size = Some(5);
        adapter.update(WIDGETS, changed).unwrap();
    }

    #[test]
    fn persist_dispatches_on_identity() {
        let (store, adapter) = adapter();
        let created = adapter.persist(WIDGETS, Widget::new("A", 1)).unwrap();
        assert!(created.id.is_some());

        let mut changed = created.clone();
        changed.name = "B".into();
        let updated = adapter.persist(WIDGETS, changed).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_missing_record_succeeds() {
        let (_, adapter) = adapter();
        let mut w = Widget::new("A", 1);
        w.id = Some(EntityId::Id(7));
        adapter.delete(WIDGETS, &w).unwrap();
    }

    #[test]
    fn delete_by_id_and_exists() {
        let (_, adapter) = adapter();
        let w = adapter.create(WIDGETS, Widget::new("A", 1)).unwrap();
        let id = w.id.unwrap();
        let widgets = adapter.command::<Widget>(WIDGETS).unwrap();
        assert!(widgets.exists(&id).unwrap());
        widgets.delete_by_id(&id).unwrap();
        assert!(!widgets.exists(&id).unwrap());
    }

    // ---- Registry ----

    #[test]
    fn unknown_collection() {
        let (_, adapter) = adapter();
        let err = adapter.find::<Widget>("gadgets", &EntityId::Id(1)).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Mapping(MappingError::UnmappedCollection(_))
        ));
    }

    #[test]
    fn builder_rejects_duplicate_symbol() {
        let store: Arc<dyn StoreClient> = Arc::new(InMemoryDatastore::new());
        let result = Adapter::builder(store)
            .register::<Widget, _>(WIDGETS, SerdeMapping::new("Widget"))
            .unwrap()
            .register::<Widget, _>(WIDGETS, SerdeMapping::new("Widget"));
        assert!(matches!(
            result,
            Err(AdapterError::Mapping(MappingError::DuplicateCollection(_)))
        ));
    }

    #[test]
    fn builder_rejects_bad_config() {
        let store: Arc<dyn StoreClient> = Arc::new(InMemoryDatastore::new());
        let config = AdapterConfig {
            max_limit: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            Adapter::builder(store).config(config).build(),
            Err(AdapterError::Config(_))
        ));
    }

    #[test]
    fn renamed_attributes_reach_the_store() {
        let store = Arc::new(InMemoryDatastore::new());
        let client: Arc<dyn StoreClient> = store.clone();
        let adapter = Adapter::builder(client)
            .register::<Widget, _>(WIDGETS, SerdeMapping::new("Widget").rename("name", "Name"))
            .unwrap()
            .build()
            .unwrap();

        let w = adapter.create(WIDGETS, Widget::new("A", 1)).unwrap();
        let key = store.key("Widget", w.id.clone());
        let stored = store.lookup(&key).unwrap().unwrap();
        assert_eq!(stored.get("Name"), Some(&Value::from("A")));
        assert!(stored.get("name").is_none());

        let hits: Vec<Widget> = adapter
            .query::<Widget>(WIDGETS)
            .unwrap()
            .where_eq("name", "A")
            .to_vec()
            .unwrap();
        assert_eq!(hits, vec![w]);
    }

    // ---- Queries ----

    fn seeded() -> (Arc<InMemoryDatastore>, Adapter) {
        let (store, adapter) = adapter();
        for (name, size) in [("A", 3), ("B", 1), ("C", 2), ("D", 2)] {
            adapter.create(WIDGETS, Widget::new(name, size)).unwrap();
        }
        (store, adapter)
    }

    fn names(widgets: Vec<Widget>) -> Vec<String> {
        widgets.into_iter().map(|w| w.name).collect()
    }

    #[test]
    fn query_is_deferred() {
        let (store, adapter) = seeded();
        let before = store.queries_run();
        let query = adapter
            .query::<Widget>(WIDGETS)
            .unwrap()
            .where_eq("size", 2)
            .order("name");
        assert_eq!(store.queries_run(), before);

        assert_eq!(names(query.to_vec().unwrap()), vec!["C", "D"]);
        assert_eq!(store.queries_run(), before + 1);
        assert_eq!(names(query.to_vec().unwrap()), vec!["C", "D"]);
        assert_eq!(store.queries_run(), before + 2);
    }

    #[test]
    fn query_order_offset_limit() {
        let (_, adapter) = seeded();
        let hits = adapter
            .query_with::<Widget, _>(WIDGETS, |q| q.order("size").order_desc("name").offset(1).limit(2))
            .unwrap()
            .to_vec()
            .unwrap();
        assert_eq!(names(hits), vec!["D", "C"]);
    }

    #[test]
    fn last_limit_wins() {
        let (_, adapter) = seeded();
        let query = adapter.query::<Widget>(WIDGETS).unwrap().limit(1).limit(3);
        assert_eq!(query.count().unwrap(), 3);
    }

    #[test]
    fn query_filter_operators() {
        let (_, adapter) = seeded();
        let query = adapter.query::<Widget>(WIDGETS).unwrap();
        let big = query.clone().filter("size", FilterOp::GreaterThan, 1).count().unwrap();
        assert_eq!(big, 3);
        let some = query
            .filter("name", FilterOp::In, Value::Array(vec!["A".into(), "Z".into()]))
            .to_vec()
            .unwrap();
        assert_eq!(names(some), vec!["A"]);
    }

    #[test]
    fn invalid_query_is_a_read_error() {
        let (_, adapter) = seeded();
        let err = adapter
            .query::<Widget>(WIDGETS)
            .unwrap()
            .filter("size", FilterOp::In, 2)
            .to_vec()
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::StoreRead {
                source: StoreError::InvalidQuery(_),
                ..
            }
        ));
    }

    #[test]
    fn query_first_fetches_one_row() {
        let (store, adapter) = seeded();
        let first = adapter
            .query::<Widget>(WIDGETS)
            .unwrap()
            .order_desc("size")
            .first()
            .unwrap()
            .unwrap();
        assert_eq!(first.name, "A");
        assert_eq!(store.open_cursors(), 0);
    }

    #[test]
    fn abandoned_iteration_releases_cursor() {
        let (store, adapter) = seeded();
        let query = adapter.query::<Widget>(WIDGETS).unwrap();
        {
            let mut iter = query.iter().unwrap();
            assert!(iter.next().is_some());
            assert_eq!(store.open_cursors(), 1);
        }
        assert_eq!(store.open_cursors(), 0);
    }

    #[test]
    fn configured_limits_apply() {
        let config = AdapterConfig {
            default_limit: Some(2),
            max_limit: Some(3),
            ..Default::default()
        };
        let (_, adapter) = adapter_with(config);
        for (name, size) in [("A", 1), ("B", 2), ("C", 3), ("D", 4)] {
            adapter.create(WIDGETS, Widget::new(name, size)).unwrap();
        }
        let query = adapter.query::<Widget>(WIDGETS).unwrap();
        assert_eq!(query.count().unwrap(), 2);
        assert_eq!(query.clone().limit(10).count().unwrap(), 3);
    }

    #[test]
    fn undecodable_row_surfaces_mapping_error() {
        let (store, adapter) = adapter();
        store
            .save(
                &store.key("Widget", Some(EntityId::Id(5))),
                &PropertyBag::new().with("name", 12_i64),
            )
            .unwrap();
        let err = adapter.first::<Widget>(WIDGETS).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Mapping(MappingError::Deserialize { .. })
        ));
    }

    // ---- Transactions ----

    #[test]
    fn transaction_commits_on_success() {
        let (store, adapter) = adapter();
        let created = adapter
            .transaction(TransactionOptions::default(), |tx| {
                let a = tx.create(WIDGETS, Widget::new("A", 1))?;
                let b = tx.create(WIDGETS, Widget::new("B", 2))?;
                // Own writes are visible inside the scope.
                assert!(tx.find::<Widget>(WIDGETS, a.id.as_ref().unwrap())?.is_some());
                Ok((a, b))
            })
            .unwrap();
        assert_eq!(store.len(), 2);
        let found: Widget = adapter.find(WIDGETS, created.1.id.as_ref().unwrap()).unwrap().unwrap();
        assert_eq!(found.name, "B");
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let (store, adapter) = adapter();
        let err = adapter
            .transaction(TransactionOptions::default(), |tx| {
                tx.create(WIDGETS, Widget::new("A", 1))?;
                tx.update(WIDGETS, Widget::new("no id", 2))?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, AdapterError::IdentityRequired { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn read_only_transaction_rejects_writes() {
        let (store, adapter) = adapter();
        let err = adapter
            .transaction(TransactionOptions::read_only(), |tx| {
                tx.create(WIDGETS, Widget::new("A", 1))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::StoreWrite {
                source: StoreError::ReadOnly,
                ..
            }
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn conflicting_transaction_fails_to_commit() {
        let (_, adapter) = adapter();
        let w = adapter.create(WIDGETS, Widget::new("A", 1)).unwrap();
        let id = w.id.clone().unwrap();

        let err = adapter
            .transaction(TransactionOptions::default(), |tx| {
                let mut mine: Widget = tx.find(WIDGETS, &id)?.unwrap();
                // A concurrent writer changes the record outside the scope.
                let mut theirs = w.clone();
                theirs.name = "theirs".into();
                adapter.update(WIDGETS, theirs)?;

                mine.name = "mine".into();
                tx.update(WIDGETS, mine)?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Transaction(StoreError::Conflict { .. })
        ));
        let stored: Widget = adapter.find(WIDGETS, &id).unwrap().unwrap();
        assert_eq!(stored.name, "theirs");
    }

    #[test]
    fn panicking_body_rolls_back() {
        let (store, adapter) = adapter();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            adapter.transaction(TransactionOptions::default(), |tx| {
                tx.create(WIDGETS, Widget::new("A", 1))?;
                let fail = true;
                if fail {
                    panic!("body failed after writing");
                }
                Ok(())
            })
        }));
        assert!(result.is_err());
        assert!(store.is_empty());

        // The store is still usable afterwards.
        adapter.create(WIDGETS, Widget::new("B", 2)).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn read_only_transaction_sees_a_consistent_view() {
        let (_, adapter) = adapter();
        let a = adapter.create(WIDGETS, Widget::new("A", 100)).unwrap();
        let b = adapter.create(WIDGETS, Widget::new("B", 0)).unwrap();

        let err = adapter
            .transaction(TransactionOptions::read_only(), |tx| {
                let before: Widget = tx.find(WIDGETS, a.id.as_ref().unwrap())?.unwrap();

                // A transfer commits between the two reads.
                adapter.transaction(TransactionOptions::default(), |transfer| {
                    let mut from: Widget = transfer.find(WIDGETS, a.id.as_ref().unwrap())?.unwrap();
                    let mut to: Widget = transfer.find(WIDGETS, b.id.as_ref().unwrap())?.unwrap();
                    from.size = Some(0);
                    to.size = Some(100);
                    transfer.update(WIDGETS, from)?;
                    transfer.update(WIDGETS, to)?;
                    Ok(())
                })?;

                let after: Widget = tx.find(WIDGETS, b.id.as_ref().unwrap())?.unwrap();
                Ok(before.size.unwrap_or(0) + after.size.unwrap_or(0))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Transaction(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn nested_begin_is_rejected() {
        let (_, adapter) = adapter();
        let result = adapter.transaction(TransactionOptions::default(), |tx| {
            Ok(matches!(
                tx.store().begin(TransactionOptions::default()),
                Err(StoreError::NestedTransaction)
            ))
        });
        assert!(result.unwrap());
    }

    #[test]
    fn queries_inside_transaction_see_pending_writes() {
        let (_, adapter) = seeded();
        let count = adapter
            .transaction(TransactionOptions::default(), |tx| {
                tx.create(WIDGETS, Widget::new("E", 9))?;
                tx.query::<Widget>(WIDGETS)?.count()
            })
            .unwrap();
        assert_eq!(count, 5);
    }

    // ---- Unsupported / lifecycle ----

    #[test]
    fn unsupported_operations() {
        let (_, adapter) = adapter();
        assert!(matches!(
            adapter.clear(WIDGETS),
            Err(AdapterError::UnsupportedOperation { operation: "clear" })
        ));
        assert!(matches!(
            adapter.fetch::<Widget>(WIDGETS, &[EntityId::Id(1)]),
            Err(AdapterError::UnsupportedOperation { operation: "fetch" })
        ));
        assert!(matches!(
            adapter.execute("DELETE FROM widgets"),
            Err(AdapterError::UnsupportedOperation { operation: "execute" })
        ));
    }

    #[test]
    fn shutdown_closes_the_store() {
        let (store, adapter) = adapter();
        adapter.shutdown().unwrap();
        assert!(store.is_closed());
        assert!(matches!(
            store.lookup(&store.key("Widget", Some(EntityId::Id(1)))),
            Err(StoreError::Closed)
        ));
    }

    #[test]
    fn adapter_is_shareable_across_threads() {
        let (store, adapter) = adapter();
        let adapter = Arc::new(adapter);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let adapter = Arc::clone(&adapter);
                std::thread::spawn(move || {
                    adapter
                        .create(WIDGETS, Widget::new(&format!("w{i}"), i))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 4);
    }

    proptest! {
        #[test]
        fn created_entities_read_back_unchanged(name in "\\PC{0,24}", size in any::<Option<i64>>()) {
            let (_, adapter) = adapter();
            let mut w = Widget::new(&name, 0);
            w.size = size;
            let created = adapter.create(WIDGETS, w).unwrap();
            let found: Widget = adapter
                .find(WIDGETS, created.id.as_ref().unwrap())
                .unwrap()
                .unwrap();
            prop_assert_eq!(found, created);
        }
    }
}
