//! Lazy, deferred queries over one mapped collection.
//!
//! A [`Query`] accumulates clauses without touching the store. Only the
//! terminal calls ([`Query::iter`], [`Query::to_vec`], [`Query::first`],
//! [`Query::count`]) run it, and every terminal call runs it again: results
//! are never cached.

use std::sync::Arc;

use kvmap_mapper::{Entity, MappedCollection};
use kvmap_store::{Filter, FilterOp, NativeQuery, Order, RowCursor, StoreClient};
use kvmap_types::{Value, KEY_PROPERTY};
use tracing::debug;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};

/// One accumulated query clause, already in native property names.
#[derive(Clone, Debug, PartialEq)]
pub enum Clause {
    Filter(Filter),
    Order(Order),
    Limit(usize),
    Offset(usize),
}

/// Deferred query against one collection.
pub struct Query<'a, E> {
    store: &'a dyn StoreClient,
    mapping: Arc<dyn MappedCollection<E>>,
    config: &'a AdapterConfig,
    clauses: Vec<Clause>,
}

impl<E> Clone for Query<'_, E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            mapping: Arc::clone(&self.mapping),
            config: self.config,
            clauses: self.clauses.clone(),
        }
    }
}

impl<'a, E: Entity> Query<'a, E> {
    /// Pseudo-attribute naming the record key; order by it for key order.
    pub const KEY: &'static str = KEY_PROPERTY;

    pub fn new(
        store: &'a dyn StoreClient,
        mapping: Arc<dyn MappedCollection<E>>,
        config: &'a AdapterConfig,
    ) -> Self {
        Self {
            store,
            mapping,
            config,
            clauses: Vec::new(),
        }
    }

    pub fn kind(&self) -> &str {
        self.mapping.kind()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Apply a caller-supplied block of clauses.
    pub fn configure(self, configure: impl FnOnce(Self) -> Self) -> Self {
        configure(self)
    }

    pub fn filter(mut self, attribute: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        let property = self.native(attribute);
        self.clauses
            .push(Clause::Filter(Filter::new(property, op, value)));
        self
    }

    pub fn where_eq(self, attribute: &str, value: impl Into<Value>) -> Self {
        self.filter(attribute, FilterOp::Equal, value)
    }

    pub fn order(mut self, attribute: &str) -> Self {
        let property = self.native(attribute);
        self.clauses.push(Clause::Order(Order::asc(property)));
        self
    }

    pub fn order_desc(mut self, attribute: &str) -> Self {
        let property = self.native(attribute);
        self.clauses.push(Clause::Order(Order::desc(property)));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.clauses.push(Clause::Limit(limit));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.clauses.push(Clause::Offset(offset));
        self
    }

    fn native(&self, attribute: &str) -> String {
        if attribute == Self::KEY {
            attribute.to_string()
        } else {
            self.mapping.native_property(attribute)
        }
    }

    /// Compile the clauses into the store's query form.
    ///
    /// Later `limit`/`offset` clauses replace earlier ones. Configured
    /// limits apply here.
    pub fn to_native(&self) -> NativeQuery {
        let mut native = NativeQuery::new(self.mapping.kind());
        let mut limit = None;
        for clause in &self.clauses {
            match clause {
                Clause::Filter(filter) => native.filters.push(filter.clone()),
                Clause::Order(order) => native.orders.push(order.clone()),
                Clause::Limit(n) => limit = Some(*n),
                Clause::Offset(n) => native.offset = *n,
            }
        }
        native.limit = self.config.effective_limit(limit);
        native
    }

    /// Run the query and stream mapped entities.
    pub fn iter(&self) -> AdapterResult<QueryIter<'a, E>> {
        self.run(&self.to_native())
    }

    pub fn to_vec(&self) -> AdapterResult<Vec<E>> {
        self.iter()?.collect()
    }

    /// First matching entity, fetching at most one row.
    pub fn first(&self) -> AdapterResult<Option<E>> {
        let mut native = self.to_native();
        native.limit = Some(native.limit.map_or(1, |limit| limit.min(1)));
        self.run(&native)?.next().transpose()
    }

    fn run(&self, native: &NativeQuery) -> AdapterResult<QueryIter<'a, E>> {
        let store = self.store;
        let cursor = store.run_query(native).map_err(AdapterError::read("query"))?;
        debug!(
            kind = %native.kind,
            filters = native.filters.len(),
            orders = native.orders.len(),
            limit = ?native.limit,
            "query started"
        );
        Ok(QueryIter {
            cursor,
            mapping: Arc::clone(&self.mapping),
        })
    }

    /// Number of matching rows. Rows are not deserialized.
    pub fn count(&self) -> AdapterResult<usize> {
        let native = self.to_native();
        let store = self.store;
        let cursor = store.run_query(&native).map_err(AdapterError::read("count"))?;
        let mut count = 0;
        for row in cursor {
            row.map_err(AdapterError::read("count"))?;
            count += 1;
        }
        Ok(count)
    }
}

impl<E> std::fmt::Debug for Query<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.mapping.kind())
            .field("clauses", &self.clauses)
            .finish()
    }
}

/// Cursor over mapped query results. Single pass.
pub struct QueryIter<'a, E> {
    cursor: RowCursor<'a>,
    mapping: Arc<dyn MappedCollection<E>>,
}

impl<E> Iterator for QueryIter<'_, E> {
    type Item = AdapterResult<E>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.cursor.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(AdapterError::read("query")(e))),
        };
        Some(
            self.mapping
                .deserialize(&row.key, row.properties)
                .map_err(AdapterError::from),
        )
    }
}
