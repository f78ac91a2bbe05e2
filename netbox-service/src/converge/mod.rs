pub mod diff;

use serde_json::{json, Map, Value};
use shared::protocol::SERVICES_ENDPOINT;
use shared::types::{Diff, ModuleResult, ServiceData, ServiceRecord, State};
use crate::assemble::{self, ServiceRequest};
use crate::error::ConvergeError;
use crate::netbox::NetboxClient;

/// A service as found on the remote side: the decoded view used for
/// comparison plus the raw object reported back to the caller.
struct Existing {
    record: ServiceRecord,
    raw: Value,
}

/// Bring one service record in line with `state`.
///
/// Lookups always run. With `check_mode` no create, update or delete is
/// sent and the result describes what would have happened.
pub async fn converge(
    client: &NetboxClient,
    state: State,
    data: &ServiceData,
    check_mode: bool,
) -> Result<ModuleResult, ConvergeError> {
    let request = assemble::assemble(client, state, data).await?;
    let existing = find_existing(client, &request).await?;

    match (state, existing) {
        (State::Present, None) => create(client, &request, check_mode).await,
        (State::Present, Some(existing)) => update(client, &request, existing, check_mode).await,
        (State::Absent, Some(existing)) => delete(client, &request, existing, check_mode).await,
        (State::Absent, None) => Ok(ModuleResult {
            msg: format!("service {} already absent", request.name()),
            ..ModuleResult::default()
        }),
    }
}

async fn find_existing(
    client: &NetboxClient,
    request: &ServiceRequest,
) -> Result<Option<Existing>, ConvergeError> {
    let mut found = client.list(SERVICES_ENDPOINT, &request.lookup).await?;
    match found.len() {
        0 => Ok(None),
        1 => {
            let raw = found.remove(0);
            let record = serde_json::from_value(raw.clone()).map_err(|e| ConvergeError::Decode {
                context: format!("service {} lookup", request.name()),
                source: e,
            })?;
            Ok(Some(Existing { record, raw }))
        }
        _ => Err(ConvergeError::Ambiguous {
            field: "service",
            value: request.name().to_string(),
        }),
    }
}

async fn create(
    client: &NetboxClient,
    request: &ServiceRequest,
    check_mode: bool,
) -> Result<ModuleResult, ConvergeError> {
    let body = serde_json::to_value(&request.payload).map_err(|e| ConvergeError::Decode {
        context: format!("service {} payload", request.name()),
        source: e,
    })?;

    let service = if check_mode {
        body
    } else {
        let created = client.create(SERVICES_ENDPOINT, &body).await?;
        tracing::info!("Created service {} (id {})", request.name(), created["id"]);
        created
    };

    Ok(ModuleResult {
        changed: true,
        msg: format!("service {} created", request.name()),
        service: Some(service),
        diff: Some(state_diff("absent", "present")),
        ..ModuleResult::default()
    })
}

async fn update(
    client: &NetboxClient,
    request: &ServiceRequest,
    existing: Existing,
    check_mode: bool,
) -> Result<ModuleResult, ConvergeError> {
    let changes = diff::changed_fields(&existing.record, &request.payload);
    if changes.is_empty() {
        return Ok(ModuleResult {
            msg: format!("service {} already exists", request.name()),
            service: Some(existing.raw),
            ..ModuleResult::default()
        });
    }

    let patch = Value::Object(changes.patch.clone());
    let service = if check_mode {
        merged(existing.raw, &changes.patch)
    } else {
        let updated = client.update(SERVICES_ENDPOINT, existing.record.id, &patch).await?;
        tracing::info!(
            "Updated service {} (id {}): {}",
            request.name(),
            existing.record.id,
            changes.patch.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        updated
    };

    Ok(ModuleResult {
        changed: true,
        msg: format!("service {} updated", request.name()),
        service: Some(service),
        diff: Some(changes.into_diff()),
        ..ModuleResult::default()
    })
}

async fn delete(
    client: &NetboxClient,
    request: &ServiceRequest,
    existing: Existing,
    check_mode: bool,
) -> Result<ModuleResult, ConvergeError> {
    if !check_mode {
        client.delete(SERVICES_ENDPOINT, existing.record.id).await?;
        tracing::info!("Deleted service {} (id {})", request.name(), existing.record.id);
    }

    Ok(ModuleResult {
        changed: true,
        msg: format!("service {} deleted", request.name()),
        service: None,
        diff: Some(state_diff("present", "absent")),
        ..ModuleResult::default()
    })
}

fn state_diff(before: &str, after: &str) -> Diff {
    let mut diff = Diff::default();
    diff.before.insert("state".to_string(), json!(before));
    diff.after.insert("state".to_string(), json!(after));
    diff
}

/// Predicted record after a partial update.
fn merged(mut raw: Value, patch: &Map<String, Value>) -> Value {
    if let Some(object) = raw.as_object_mut() {
        for (key, value) in patch {
            object.insert(key.clone(), value.clone());
        }
    }
    raw
}
