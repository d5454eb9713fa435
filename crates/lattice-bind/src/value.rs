//! Property and variable mappings.
//!
//! Both [`PropertySet`] and [`Variables`] store their values behind an
//! [`Arc`]. A variable builder that forwards a property (see
//! [`Variables::forward`]) therefore hands the *same allocation* to the
//! variable mapping, and shallow equality can compare nested structures by
//! identity the way a reference comparison would.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

/// A value shared between property snapshots and variable mappings.
pub type SharedValue = Arc<Value>;

/// Free-form fields merged into local state by responses and transforms.
pub type Fields = Map<String, Value>;

/// An immutable snapshot of the properties a component was rendered with.
///
/// Property sets are supplied by the rendering framework on mount and on
/// every update. The controller only ever reads them.
#[derive(Clone, Default, PartialEq)]
pub struct PropertySet {
    entries: BTreeMap<String, SharedValue>,
}

impl PropertySet {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a property value.
    ///
    /// # Example
    ///
    /// ```
    /// use lattice_bind::PropertySet;
    ///
    /// let props = PropertySet::new().with("id", 1).with("title", "Inbox");
    /// assert_eq!(props.len(), 2);
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), Arc::new(value.into()));
        self
    }

    /// Builder-style insert of an already shared value, preserving its identity.
    pub fn with_shared(mut self, key: impl Into<String>, value: SharedValue) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    /// Build a property set from a JSON object. Non-object values yield an
    /// empty set.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => Self::default(),
        }
    }

    /// Get the shared value for a key.
    pub fn get_shared(&self, key: &str) -> Option<&SharedValue> {
        self.entries.get(key)
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(AsRef::as_ref)
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Render the properties as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::clone(v)))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        }
    }
}

impl fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// The variable mapping sent along with a document.
///
/// Variables are produced by a [`VariableBuilder`](crate::VariableBuilder)
/// from the current properties. They double as the identity used for change
/// detection, see [`Variables::shallow_eq`].
#[derive(Clone, Default)]
pub struct Variables {
    entries: BTreeMap<String, SharedValue>,
}

impl Variables {
    /// Create an empty variable mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a variable value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), Arc::new(value.into()));
        self
    }

    /// Forward a property under the same name, sharing its allocation.
    ///
    /// Missing properties are skipped.
    pub fn forward(self, props: &PropertySet, key: &str) -> Self {
        self.forward_as(props, key, key)
    }

    /// Forward a property under a different variable name.
    pub fn forward_as(mut self, props: &PropertySet, key: &str, name: impl Into<String>) -> Self {
        if let Some(value) = props.get_shared(key) {
            self.entries.insert(name.into(), Arc::clone(value));
        }
        self
    }

    /// Insert a variable value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), Arc::new(value.into()));
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(AsRef::as_ref)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Shallow equality.
    ///
    /// Two mappings are equal when they have the same key set and every pair
    /// of values is either the same shared allocation or two equal scalars
    /// (`null`, booleans, numbers, strings). Numbers compare by value, so an
    /// integer equals the float with the same value. Arrays and objects are compared
    /// by identity only and never recursively, so builders should return flat
    /// maps of scalars or forward nested properties unchanged.
    pub fn shallow_eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(key, value)| {
                other
                    .entries
                    .get(key)
                    .is_some_and(|theirs| same_value(value, theirs))
            })
    }

    /// Render the variables as the JSON object sent to the client.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::clone(v)))
                .collect(),
        )
    }
}

fn same_value(a: &SharedValue, b: &SharedValue) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (a.as_ref(), b.as_ref()) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => same_number(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        _ => false,
    }
}

/// Integers compare exactly; a float equals any number with the same value,
/// so `1` and `1.0` are the same variable.
fn same_number(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if x.is_f64() || y.is_f64() {
        x.as_f64() == y.as_f64()
    } else {
        x == y
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        }
    }
}

impl fmt::Debug for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
