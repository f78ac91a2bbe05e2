use std::fmt;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use crate::coerce;
use crate::protocol::{PROTO_SCTP, PROTO_TCP, PROTO_UDP};

/// Target state of the managed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

/// A reference to another inventory object.
///
/// Numbers are taken as object ids, strings as names, and maps are passed
/// through as lookup query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Id(u64),
    Name(String),
    Query(Map<String, Value>),
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Id(id) => write!(f, "{}", id),
            ObjectRef::Name(name) => f.write_str(name),
            ObjectRef::Query(query) => write!(f, "{}", Value::Object(query.clone())),
        }
    }
}

/// Either a single value or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }
}

/// Transport protocol of a service, carried on the wire as its IANA number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    pub fn code(self) -> u8 {
        match self {
            Protocol::Tcp => PROTO_TCP,
            Protocol::Udp => PROTO_UDP,
            Protocol::Sctp => PROTO_SCTP,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            c if c == PROTO_TCP as u64 => Some(Protocol::Tcp),
            c if c == PROTO_UDP as u64 => Some(Protocol::Udp),
            c if c == PROTO_SCTP as u64 => Some(Protocol::Sctp),
            _ => None,
        }
    }

    /// Accepts protocol names in any case as well as numeric strings.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Ok(code) = name.parse::<u64>() {
            return Self::from_code(code);
        }
        match name.to_ascii_lowercase().as_str() {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            "sctp" => Some(Protocol::Sctp),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Sctp => "SCTP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Shapes a protocol may arrive in: `6`, `"tcp"`, or the API's choice
/// object `{"value": 6, "label": "TCP"}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawProtocol {
    Code(u64),
    Name(String),
    Choice { value: Value },
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawProtocol::deserialize(deserializer)? {
            RawProtocol::Code(code) => Protocol::from_code(code),
            RawProtocol::Name(name) => Protocol::from_name(&name),
            RawProtocol::Choice { value } => match &value {
                Value::Number(n) => n.as_u64().and_then(Protocol::from_code),
                Value::String(s) => Protocol::from_name(s),
                _ => None,
            },
        };
        parsed.ok_or_else(|| de::Error::custom("unsupported protocol, expected 6 (TCP), 17 (UDP) or 132 (SCTP)"))
    }
}

/// Desired service data as declared by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceData {
    pub name: Option<String>,

    /// Device the service runs on
    pub device: Option<ObjectRef>,

    /// Virtual machine the service runs on
    pub virtual_machine: Option<ObjectRef>,

    #[serde(default, deserialize_with = "coerce::opt_u64")]
    pub port: Option<u64>,

    pub protocol: Option<Protocol>,

    /// IP addresses the service listens on
    pub ipaddresses: Option<OneOrMany<ObjectRef>>,

    pub description: Option<String>,

    /// Must already exist on the remote side
    pub custom_fields: Option<Map<String, Value>>,
}

/// Request body for creating a service, with every reference resolved to an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicePayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_machine: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipaddresses: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Map<String, Value>>,
}

/// Id of a nested object. The API returns either a bare id or an object
/// carrying one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NestedId(pub u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNested {
    Id(u64),
    Object { id: u64 },
}

impl<'de> Deserialize<'de> for NestedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawNested::deserialize(deserializer)? {
            RawNested::Id(id) | RawNested::Object { id } => NestedId(id),
        })
    }
}

/// A service as stored by the inventory system.
/// Only the fields the converge step compares are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub device: Option<NestedId>,
    #[serde(default)]
    pub virtual_machine: Option<NestedId>,
    #[serde(default)]
    pub port: Option<u64>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub ipaddresses: Option<Vec<NestedId>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub custom_fields: Option<Map<String, Value>>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<T>,
}

/// Field values before and after a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    pub before: Map<String, Value>,
    pub after: Map<String, Value>,
}

/// Structured outcome reported back to the invoking host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleResult {
    pub changed: bool,
    pub failed: bool,
    pub msg: String,
    pub service: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
}

impl ModuleResult {
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            failed: true,
            msg: msg.into(),
            ..Self::default()
        }
    }
}
