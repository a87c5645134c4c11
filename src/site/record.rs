use serde::Serialize;
use std::collections::BTreeMap;

/// Counter values for one render, keyed by template field name.
///
/// Built fresh on every invocation and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SiteDataRecord {
    fields: BTreeMap<String, i64>,
}

impl SiteDataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: i64) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<i64> {
        self.fields.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for SiteDataRecord {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
