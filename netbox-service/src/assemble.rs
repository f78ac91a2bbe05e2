//! Turns the declared service data into a create payload plus the lookup
//! query identifying the record, resolving references to ids on the way.

use serde_json::Value;
use shared::protocol::{
    DEVICES_ENDPOINT, IP_ADDRESSES_ENDPOINT, Q_ADDRESS, Q_DEVICE_ID, Q_NAME,
    Q_VIRTUAL_MACHINE_ID, VIRTUAL_MACHINES_ENDPOINT,
};
use shared::types::{NestedId, ObjectRef, ServiceData, ServicePayload, State};
use crate::error::ConvergeError;
use crate::netbox::NetboxClient;

/// A validated, fully resolved service request.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub payload: ServicePayload,
    /// Query parameters identifying the record: name plus device/VM id
    pub lookup: Vec<(String, String)>,
}

impl ServiceRequest {
    pub fn name(&self) -> &str {
        &self.payload.name
    }
}

/// Check the argument combinations. Runs before any network call.
pub fn validate(state: State, data: &ServiceData) -> Result<(), ConvergeError> {
    let name_missing = data.name.as_deref().map_or(true, |n| n.trim().is_empty());
    if name_missing {
        let state = match state {
            State::Present => "present",
            State::Absent => "absent",
        };
        return Err(ConvergeError::validation(format!(
            "state is {} but all of the following are missing: name",
            state
        )));
    }

    if data.device.is_none() && data.virtual_machine.is_none() {
        return Err(ConvergeError::validation(
            "one of the following is required: device, virtual_machine",
        ));
    }

    if state == State::Present {
        let mut missing = Vec::new();
        if data.port.is_none() {
            missing.push("port");
        }
        if data.protocol.is_none() {
            missing.push("protocol");
        }
        if !missing.is_empty() {
            return Err(ConvergeError::validation(format!(
                "missing required arguments: {}",
                missing.join(", ")
            )));
        }
    }

    if let Some(port) = data.port {
        if port == 0 || port > u16::MAX as u64 {
            return Err(ConvergeError::validation(format!(
                "port must be between 1 and 65535, got {}",
                port
            )));
        }
    }

    Ok(())
}

/// Validate `data` and resolve its references.
///
/// For `absent` only the identity (name, device/VM) is resolved; the other
/// attributes play no part in deleting a record.
pub async fn assemble(
    client: &NetboxClient,
    state: State,
    data: &ServiceData,
) -> Result<ServiceRequest, ConvergeError> {
    validate(state, data)?;

    let name = data.name.clone().unwrap_or_default();
    let mut lookup = vec![(Q_NAME.to_string(), name.clone())];

    let device = match &data.device {
        Some(reference) => {
            let id = resolve(client, DEVICES_ENDPOINT, "device", Q_NAME, reference).await?;
            lookup.push((Q_DEVICE_ID.to_string(), id.to_string()));
            Some(id)
        }
        None => None,
    };

    let virtual_machine = match &data.virtual_machine {
        Some(reference) => {
            let id = resolve(client, VIRTUAL_MACHINES_ENDPOINT, "virtual_machine", Q_NAME, reference).await?;
            lookup.push((Q_VIRTUAL_MACHINE_ID.to_string(), id.to_string()));
            Some(id)
        }
        None => None,
    };

    let mut payload = ServicePayload {
        name,
        device,
        virtual_machine,
        port: None,
        protocol: None,
        ipaddresses: None,
        description: None,
        custom_fields: None,
    };

    if state == State::Present {
        payload.port = data.port.and_then(|p| u16::try_from(p).ok());
        payload.protocol = data.protocol;
        payload.description = data.description.clone();
        payload.custom_fields = data.custom_fields.clone();

        if let Some(addresses) = &data.ipaddresses {
            let mut ids = Vec::with_capacity(addresses.as_slice().len());
            for reference in addresses.as_slice() {
                ids.push(resolve(client, IP_ADDRESSES_ENDPOINT, "ipaddresses", Q_ADDRESS, reference).await?);
            }
            payload.ipaddresses = Some(ids);
        }
    }

    Ok(ServiceRequest { payload, lookup })
}

/// Resolve a reference to an object id. Ids are taken as given; names are
/// looked up under `name_key`; query maps are sent as-is.
async fn resolve(
    client: &NetboxClient,
    endpoint: &str,
    field: &'static str,
    name_key: &str,
    reference: &ObjectRef,
) -> Result<u64, ConvergeError> {
    let query: Vec<(String, String)> = match reference {
        ObjectRef::Id(id) => return Ok(*id),
        ObjectRef::Name(name) => vec![(name_key.to_string(), name.clone())],
        ObjectRef::Query(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), query_value(value)))
            .collect(),
    };

    let mut found = client.list(endpoint, &query).await?;
    match found.len() {
        0 => Err(ConvergeError::NotFound {
            field,
            value: reference.to_string(),
        }),
        1 => {
            let object = found.remove(0);
            let NestedId(id) = serde_json::from_value::<NestedId>(object).map_err(|e| ConvergeError::Decode {
                context: format!("{} lookup", field),
                source: e,
            })?;
            tracing::debug!("Resolved {} {} to id {}", field, reference, id);
            Ok(id)
        }
        _ => Err(ConvergeError::Ambiguous {
            field,
            value: reference.to_string(),
        }),
    }
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
