//! Query objects, directives and result sets exchanged with a store.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::item::{Item, ItemId};

/// A key/value query against store items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(Map<String, Value>);

impl Query {
    /// The empty query, matching every item.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Query for the children of `parent` through `parent_property`.
    pub fn by_parent(parent_property: &str, parent: &ItemId) -> Self {
        Self::new().with(parent_property, parent.to_value())
    }

    /// Builder-style field constraint.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// The constraint on `field`, if any.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Iterates over the constrained fields.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Whether `field` is constrained by this query.
    pub fn constrains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns `true` for the match-all query.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Built-in matcher used when a store has no query engine of its own.
    ///
    /// Every constraint must hold. An array field matches a scalar it
    /// contains, and `null` matches a missing field.
    pub fn matches(&self, item: &Item) -> bool {
        self.0.iter().all(|(field, expected)| match (item.get(field), expected) {
            (None | Some(Value::Null), Value::Null) => true,
            (None, _) => false,
            (Some(Value::Array(values)), scalar) if !scalar.is_array() => values.contains(scalar),
            (Some(actual), expected) => actual == expected,
        })
    }
}

impl From<Map<String, Value>> for Query {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A sort key for query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Field to sort by.
    pub attribute: String,
    /// Reverse the order.
    #[serde(default)]
    pub descending: bool,
}

impl SortField {
    /// Ascending sort on `attribute`.
    pub fn ascending(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            descending: false,
        }
    }

    /// Descending sort on `attribute`.
    pub fn descending(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            descending: true,
        }
    }
}

/// Paging and ordering options passed along with a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub start: usize,
    pub count: Option<usize>,
    pub sort: Vec<SortField>,
}

impl QueryOptions {
    /// Sorts and pages `items` in place. Returns the total before paging.
    pub fn apply(&self, items: &mut Vec<Item>) -> usize {
        if !self.sort.is_empty() {
            items.sort_by(|a, b| {
                for key in &self.sort {
                    let ord = compare_values(a.get(&key.attribute), b.get(&key.attribute));
                    let ord = if key.descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        let total = items.len();
        let start = self.start.min(total);
        items.drain(..start);
        if let Some(count) = self.count {
            items.truncate(count);
        }
        total
    }
}

/// Orders missing < null < bool < number < string; other kinds compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Options forwarded verbatim to a store's `load`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadOptions(pub Map<String, Value>);

/// Directives accompanying a write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutDirectives {
    /// Explicit identity for the written item.
    pub id: Option<ItemId>,
    /// Parents to stamp into the item's parent field.
    pub parents: Vec<ItemId>,
    /// Sibling the item should be placed before.
    pub before: Option<ItemId>,
    /// Replace an existing item instead of failing.
    pub overwrite: bool,
}

impl PutDirectives {
    /// Directives that replace an existing item.
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    /// Builder-style parent directive.
    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parents.push(parent);
        self
    }

    /// Builder-style `before` directive.
    pub fn with_before(mut self, before: Option<ItemId>) -> Self {
        self.before = before;
        self
    }
}

/// A position change reported by a live result set.
///
/// `None` stands for "not in the result set".
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedChange {
    pub item: Item,
    pub removed_from: Option<usize>,
    pub inserted_into: Option<usize>,
}

/// Listener attached to a live result set.
pub type ObserveListener = Arc<dyn Fn(&ObservedChange) + Send + Sync>;

/// A result set that keeps itself up to date as the store mutates.
pub trait LiveResults: Send + Sync {
    /// Attach a listener. With `include_updates`, in-place updates are
    /// reported too, not only insertions and removals.
    fn observe(&self, listener: ObserveListener, include_updates: bool) -> Subscription;

    /// The current contents.
    fn current(&self) -> Vec<Item>;
}

/// The outcome of a query.
#[derive(Clone)]
pub struct QueryResults {
    items: Vec<Item>,
    total: usize,
    live: Option<Arc<dyn LiveResults>>,
}

impl QueryResults {
    /// A plain, static result set.
    pub fn new(items: Vec<Item>) -> Self {
        let total = items.len();
        Self {
            items,
            total,
            live: None,
        }
    }

    /// Overrides the total count (for paged results).
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    /// Attaches a live view.
    pub fn with_live(mut self, live: Arc<dyn LiveResults>) -> Self {
        self.live = Some(live);
        self
    }

    /// The items, taken from the live view when there is one.
    pub fn items(&self) -> Vec<Item> {
        match &self.live {
            Some(live) => live.current(),
            None => self.items.clone(),
        }
    }

    /// Number of items currently in the set.
    pub fn len(&self) -> usize {
        match &self.live {
            Some(live) => live.current().len(),
            None => self.items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The total count reported by the store.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The live view, if the store supplied one.
    pub fn live(&self) -> Option<&Arc<dyn LiveResults>> {
        self.live.as_ref()
    }
}

impl fmt::Debug for QueryResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResults")
            .field("items", &self.items)
            .field("total", &self.total)
            .field("live", &self.live.is_some())
            .finish()
    }
}

/// RAII handle for a store listener or live-result observer.
///
/// Dropping it (or calling [`remove`](Self::remove)) detaches the listener.
#[derive(Default)]
pub struct Subscription {
    guard: Option<Box<dyn Any + Send + Sync>>,
}

impl Subscription {
    /// Wraps any guard whose drop detaches the listener.
    pub fn new(guard: impl Any + Send + Sync) -> Self {
        Self {
            guard: Some(Box::new(guard)),
        }
    }

    /// A subscription that holds nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this handle still holds a listener.
    pub fn is_active(&self) -> bool {
        self.guard.is_some()
    }

    /// Detach now.
    pub fn remove(mut self) {
        self.guard.take();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.is_active()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Item {
        Item::from_value(value).unwrap()
    }

    #[test]
    fn test_builtin_matching() {
        let child = item(json!({"id": 3, "parent": [1, 2]}));
        assert!(Query::by_parent("parent", &ItemId::Num(2)).matches(&child));
        assert!(!Query::by_parent("parent", &ItemId::Num(7)).matches(&child));
        assert!(Query::new().matches(&child));

        let top = item(json!({"id": 1, "parent": null}));
        assert!(Query::new().with("parent", Value::Null).matches(&top));
        assert!(Query::new().with("parent", Value::Null).matches(&item(json!({"id": 9}))));
        assert!(!Query::new().with("parent", Value::Null).matches(&child));
    }

    #[test]
    fn test_options_sort_and_page() {
        let mut items = vec![
            item(json!({"name": "c"})),
            item(json!({"name": "a"})),
            item(json!({"name": "b"})),
            item(json!({})),
        ];
        let options = QueryOptions {
            sort: vec![SortField::descending("name")],
            start: 1,
            count: Some(2),
        };
        assert_eq!(options.apply(&mut items), 4);
        let names: Vec<_> = items.iter().map(|i| i.str_field("name")).collect();
        assert_eq!(names, vec![Some("b"), Some("a")]);
    }

    #[test]
    fn test_subscription_drop_runs_guard() {
        struct Flag(Arc<parking_lot::Mutex<bool>>);
        impl Drop for Flag {
            fn drop(&mut self) {
                *self.0.lock() = true;
            }
        }

        let dropped = Arc::new(parking_lot::Mutex::new(false));
        let sub = Subscription::new(Flag(dropped.clone()));
        assert!(sub.is_active());
        sub.remove();
        assert!(*dropped.lock());
    }
}
