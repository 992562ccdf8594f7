use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

/// Filter predicate. Predicates combine with logical AND only.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { field: String, value: Value },
    ArrayContains { field: String, value: Value },
    Lte { field: String, value: Value },
    Gte { field: String, value: Value },
    InSet { field: String, values: Vec<Value> },
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Predicate::Eq { field, .. }
            | Predicate::ArrayContains { field, .. }
            | Predicate::Lte { field, .. }
            | Predicate::Gte { field, .. }
            | Predicate::InSet { field, .. } => field,
        }
    }

    /// Whether a document's field values satisfy this predicate.
    pub fn matches(&self, fields: &serde_json::Map<String, Value>) -> bool {
        match self {
            Predicate::Eq { field, value } => fields.get(field) == Some(value),
            Predicate::ArrayContains { field, value } => fields
                .get(field)
                .and_then(Value::as_array)
                .map(|items| items.contains(value))
                .unwrap_or(false),
            Predicate::Lte { field, value } => fields
                .get(field)
                .map(|v| compare_values(v, value) != Ordering::Greater)
                .unwrap_or(false),
            Predicate::Gte { field, value } => fields
                .get(field)
                .map(|v| compare_values(v, value) != Ordering::Less)
                .unwrap_or(false),
            Predicate::InSet { field, values } => fields
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// Composed request against one collection.
///
/// `order_by` is honored by the backend; `client_sort` is applied by the
/// ScopedStore to the returned page only, which makes the ordering
/// approximate-to-page under pagination.
#[derive(Debug, Clone)]
pub struct Query {
    pub collection: String,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub client_sort: Option<OrderBy>,
    pub limit: Option<usize>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The backing store supports a single in-set filter per query. Surfaced
    /// at compose time instead of silently dropping predicates.
    #[error("at most one in-set filter per query, got {0}")]
    MultipleInSetFilters(usize),
}

/// Composes equality/containment/range predicates plus ordering into a
/// [`Query`]. Task queries default to dueDate-ascending ordering when none is
/// requested explicitly.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    collection: String,
    predicates: Vec<Predicate>,
    order_by: Option<OrderBy>,
    client_sort_fallback: bool,
    name_sorted: bool,
    limit: Option<usize>,
}

impl QueryBuilder {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            predicates: Vec::new(),
            order_by: None,
            client_sort_fallback: false,
            name_sorted: false,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::Eq {
            field: field.into(),
            value,
        });
        self
    }

    pub fn where_array_contains(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::ArrayContains {
            field: field.into(),
            value,
        });
        self
    }

    pub fn where_lte(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::Lte {
            field: field.into(),
            value,
        });
        self
    }

    pub fn where_gte(mut self, field: impl Into<String>, value: Value) -> Self {
        self.predicates.push(Predicate::Gte {
            field: field.into(),
            value,
        });
        self
    }

    pub fn where_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.predicates.push(Predicate::InSet {
            field: field.into(),
            values,
        });
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    /// Opt in to degrading unindexed filter+order combinations to a
    /// client-side sort of the returned page instead of requiring a
    /// composite index on the backend.
    pub fn with_client_sort_fallback(mut self) -> Self {
        self.client_sort_fallback = true;
        self
    }

    /// Alphabetic name ordering, always performed client-side. Used for
    /// team/project listings to avoid index proliferation.
    pub fn sorted_by_name(mut self) -> Self {
        self.name_sorted = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn compose(self) -> Result<Query, QueryError> {
        let in_set_count = self
            .predicates
            .iter()
            .filter(|p| matches!(p, Predicate::InSet { .. }))
            .count();
        if in_set_count > 1 {
            return Err(QueryError::MultipleInSetFilters(in_set_count));
        }

        let mut order_by = self.order_by;
        if order_by.is_none() && !self.name_sorted && self.collection == "tasks" {
            order_by = Some(OrderBy::asc("dueDate"));
        }

        let mut client_sort = None;
        if self.name_sorted {
            client_sort = Some(OrderBy::asc("name"));
        } else if self.client_sort_fallback {
            if let Some(order) = &order_by {
                if needs_composite_index(&self.predicates, &order.field) {
                    client_sort = order_by.take();
                }
            }
        }

        Ok(Query {
            collection: self.collection,
            predicates: self.predicates,
            order_by,
            client_sort,
            limit: self.limit,
        })
    }
}

/// A filter+order combination needs a composite index whenever the ordering
/// field differs from every filtered field.
fn needs_composite_index(predicates: &[Predicate], order_field: &str) -> bool {
    !predicates.is_empty() && predicates.iter().all(|p| p.field() != order_field)
}

/// Total order over JSON scalars used for range predicates and client-side
/// sorting: null < bool < number < string; RFC3339 timestamps order
/// chronologically as strings.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn type_rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Sort a page of documents in place by one field.
pub(crate) fn sort_documents(
    docs: &mut [crate::backend::Document],
    order: &OrderBy,
) {
    docs.sort_by(|a, b| {
        let left = a.fields.get(&order.field).unwrap_or(&Value::Null);
        let right = b.fields.get(&order.field).unwrap_or(&Value::Null);
        let ord = compare_values(left, right);
        match order.direction {
            Direction::Ascending => ord,
            Direction::Descending => ord.reverse(),
        }
    });
}
