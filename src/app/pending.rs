use crate::services::gateway::Record;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Values of the record being edited that have not reached their inputs
/// yet, typically because the combo's options are still loading.
#[derive(Debug, Default)]
pub struct PendingRecord {
    values: Record,
    unresolved: BTreeSet<String>,
}

impl PendingRecord {
    pub fn hold(&mut self, record: Record) {
        self.unresolved = record.keys().cloned().collect();
        self.values = record;
    }

    pub fn unresolved_keys(&self) -> Vec<String> {
        self.unresolved.iter().cloned().collect()
    }

    pub fn value(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.unresolved.contains(key)
    }

    pub fn resolve(&mut self, key: &str) {
        self.unresolved.remove(key);
    }

    /// The user has taken over `key`; the stored value must not overwrite
    /// it later.
    pub fn forget(&mut self, key: &str) {
        self.unresolved.remove(key);
        self.values.remove(key);
    }

    /// Mark a key as unapplied again, e.g. after its field was removed.
    pub fn reopen(&mut self, key: &str) {
        if self.values.contains_key(key) {
            self.unresolved.insert(key.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::record;
    use serde_json::json;

    #[test]
    fn keys_resolve_forget_and_reopen() {
        let mut p = PendingRecord::default();
        p.hold(record(json!({"name": "Acme", "unit": 3, "division": 9})));
        assert_eq!(p.unresolved_keys(), vec!["division", "name", "unit"]);
        p.resolve("name");
        assert!(!p.is_pending("name"));
        p.reopen("name");
        assert!(p.is_pending("name"));

        p.forget("unit");
        assert!(p.value("unit").is_none());
        p.reopen("unit");
        assert!(!p.is_pending("unit"));
    }
}
