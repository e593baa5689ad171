//! Items produced by analyzers and consumed by processors.

use std::collections::HashMap;

use serde_json::Value;

/// A mapping from string keys to arbitrary values, produced by an
/// [`crate::module::Analyzer`] and consumed by a [`crate::module::Processor`]
/// (spec.md §3). `serde_json::Value` gives arbitrary structured payloads
/// without the scheduler needing to know an item's shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item(HashMap<String, Value>);

impl Item {
    pub fn new() -> Self {
        Item(HashMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Item {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Item(HashMap::from_iter(iter))
    }
}

/// A datum produced by an analyzer: either a new crawl request that must
/// re-enter the admission pipeline, or an item bound for the item pool
/// (spec.md §4.7).
#[derive(Debug, Clone)]
pub enum Data {
    Request(crate::request::Request),
    Item(Item),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_round_trip() {
        let mut item = Item::new();
        item.insert("title", "hello");
        assert_eq!(item.get("title"), Some(&Value::String("hello".into())));
        assert_eq!(item.len(), 1);
    }
}
