use serde_json::{json, Map, Value};
use shared::types::{Diff, NestedId, ServicePayload, ServiceRecord};

/// Fields of an existing record that must change to match the desired payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    /// Body for the partial update
    pub patch: Map<String, Value>,
    pub before: Map<String, Value>,
    pub after: Map<String, Value>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
    }

    pub fn into_diff(self) -> Diff {
        Diff {
            before: self.before,
            after: self.after,
        }
    }

    fn record(&mut self, field: &str, before: Value, after: Value) {
        self.before.insert(field.to_string(), before);
        self.patch.insert(field.to_string(), after.clone());
        self.after.insert(field.to_string(), after);
    }
}

/// Compare only the fields the caller supplied. References compare by id,
/// the protocol by its code, addresses as an id set, and custom fields only
/// on the keys present in `desired`.
pub fn changed_fields(existing: &ServiceRecord, desired: &ServicePayload) -> Changes {
    let mut changes = Changes::default();

    if existing.name != desired.name {
        changes.record("name", json!(existing.name), json!(desired.name));
    }

    if let Some(device) = desired.device {
        let current = existing.device.map(|NestedId(id)| id);
        if current != Some(device) {
            changes.record("device", json!(current), json!(device));
        }
    }

    if let Some(vm) = desired.virtual_machine {
        let current = existing.virtual_machine.map(|NestedId(id)| id);
        if current != Some(vm) {
            changes.record("virtual_machine", json!(current), json!(vm));
        }
    }

    if let Some(port) = desired.port {
        if existing.port != Some(port as u64) {
            changes.record("port", json!(existing.port), json!(port));
        }
    }

    if let Some(protocol) = desired.protocol {
        if existing.protocol != Some(protocol) {
            changes.record(
                "protocol",
                json!(existing.protocol.map(|p| p.code())),
                json!(protocol.code()),
            );
        }
    }

    if let Some(wanted) = &desired.ipaddresses {
        let mut current: Vec<u64> = existing
            .ipaddresses
            .iter()
            .flatten()
            .map(|NestedId(id)| *id)
            .collect();
        let mut wanted = wanted.clone();
        current.sort_unstable();
        current.dedup();
        wanted.sort_unstable();
        wanted.dedup();
        if current != wanted {
            changes.record("ipaddresses", json!(current), json!(wanted));
        }
    }

    if let Some(description) = &desired.description {
        let current = existing.description.as_deref().unwrap_or("");
        if current != description {
            changes.record("description", json!(current), json!(description));
        }
    }

    if let Some(wanted) = &desired.custom_fields {
        let current = existing.custom_fields.clone().unwrap_or_default();
        let mut before = Map::new();
        let mut after = Map::new();
        for (key, value) in wanted {
            let old = current.get(key).cloned().unwrap_or(Value::Null);
            if old != *value {
                before.insert(key.clone(), old);
                after.insert(key.clone(), value.clone());
            }
        }
        if !after.is_empty() {
            // Send the merged map so keys the caller did not name are kept.
            let mut merged = current;
            merged.extend(after.clone());
            changes.before.insert("custom_fields".to_string(), Value::Object(before));
            changes.after.insert("custom_fields".to_string(), Value::Object(after));
            changes.patch.insert("custom_fields".to_string(), Value::Object(merged));
        }
    }

    changes
}
