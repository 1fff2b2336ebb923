//! Store-native query primitives.
//!
//! A [`NativeQuery`] names one kind and carries conjunctive filters, a
//! lexicographic ordering, an offset and a limit. Backends that hold their
//! data in memory can evaluate a query over candidate rows with
//! [`NativeQuery::evaluate`].

use std::borrow::Cow;
use std::cmp::Ordering;

use kvmap_types::{NativeKey, PropertyBag, Value, KEY_PROPERTY};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::StoredEntity;

/// Comparison operator of a property filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    /// Property equals any element of the filter value, which must be an array.
    In,
}

impl FilterOp {
    /// Parse the operator spellings accepted in query text (`=`, `!=`, `<`,
    /// `<=`, `>`, `>=`, `in`).
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "=" | "==" => Some(FilterOp::Equal),
            "!=" => Some(FilterOp::NotEqual),
            "<" => Some(FilterOp::LessThan),
            "<=" => Some(FilterOp::LessThanOrEqual),
            ">" => Some(FilterOp::GreaterThan),
            ">=" => Some(FilterOp::GreaterThanOrEqual),
            "in" | "IN" => Some(FilterOp::In),
            _ => None,
        }
    }

    fn accepts(self, stored: &Value, operand: &Value) -> bool {
        let ord = stored.total_cmp(operand);
        match self {
            FilterOp::Equal => ord == Ordering::Equal,
            FilterOp::NotEqual => ord != Ordering::Equal,
            FilterOp::LessThan => ord == Ordering::Less,
            FilterOp::LessThanOrEqual => ord != Ordering::Greater,
            FilterOp::GreaterThan => ord == Ordering::Greater,
            FilterOp::GreaterThanOrEqual => ord != Ordering::Less,
            FilterOp::In => match operand {
                Value::Array(options) => options
                    .iter()
                    .any(|option| stored.total_cmp(option) == Ordering::Equal),
                _ => false,
            },
        }
    }
}

/// One property filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub property: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(property: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    /// Whether a row satisfies this filter.
    ///
    /// Rows without the property never match. An array property matches when
    /// any of its elements matches, unless the operand is itself an array
    /// compared with `Equal`/`NotEqual`.
    pub fn matches(&self, key: &NativeKey, properties: &PropertyBag) -> bool {
        let Some(stored) = property_of(key, properties, &self.property) else {
            return false;
        };
        let stored = stored.as_ref();
        match (stored, &self.value, self.op) {
            (Value::Array(_), Value::Array(_), FilterOp::Equal | FilterOp::NotEqual) => {
                self.op.accepts(stored, &self.value)
            }
            (Value::Array(items), _, _) => items.iter().any(|item| self.op.accepts(item, &self.value)),
            _ => self.op.accepts(stored, &self.value),
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// One ordering term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Descending,
        }
    }
}

/// A query over one kind in the store's native form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NativeQuery {
    pub kind: String,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl NativeQuery {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
            orders: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reject clauses no backend can evaluate.
    pub fn validate(&self) -> StoreResult<()> {
        for filter in &self.filters {
            if filter.op == FilterOp::In && !matches!(filter.value, Value::Array(_)) {
                return Err(StoreError::InvalidQuery(format!(
                    "'in' filter on {} needs an array operand, got {}",
                    filter.property,
                    filter.value.type_name()
                )));
            }
        }
        Ok(())
    }

    /// Evaluate the query over candidate rows of any kind.
    ///
    /// Rows of other kinds are skipped. Filters apply conjunctively; rows
    /// lacking an ordered property are excluded, matching how
    /// property-indexed stores behave. Ties fall back to ascending key order.
    pub fn evaluate(&self, rows: impl IntoIterator<Item = StoredEntity>) -> Vec<StoredEntity> {
        let mut matched: Vec<StoredEntity> = rows
            .into_iter()
            .filter(|row| row.key.kind == self.kind)
            .filter(|row| {
                self.filters
                    .iter()
                    .all(|f| f.matches(&row.key, &row.properties))
            })
            .filter(|row| {
                self.orders
                    .iter()
                    .all(|o| property_of(&row.key, &row.properties, &o.property).is_some())
            })
            .collect();

        matched.sort_by(|a, b| self.compare(a, b));

        let rows = matched.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }

    fn compare(&self, a: &StoredEntity, b: &StoredEntity) -> Ordering {
        let null = Value::Null;
        for order in &self.orders {
            let va = property_of(&a.key, &a.properties, &order.property);
            let vb = property_of(&b.key, &b.properties, &order.property);
            let (va, vb) = (
                va.as_deref().unwrap_or(&null),
                vb.as_deref().unwrap_or(&null),
            );
            let ord = match order.direction {
                Direction::Ascending => va.total_cmp(vb),
                Direction::Descending => vb.total_cmp(va),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.key.cmp(&b.key)
    }
}

/// Property lookup used by filters and orders. Only `__key__` allocates.
fn property_of<'a>(
    key: &NativeKey,
    properties: &'a PropertyBag,
    name: &str,
) -> Option<Cow<'a, Value>> {
    if name == KEY_PROPERTY {
        return Some(Cow::Owned(Value::Key(key.clone())));
    }
    properties.get(name).map(Cow::Borrowed)
}
