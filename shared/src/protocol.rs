/// REST endpoint for IPAM services
pub const SERVICES_ENDPOINT: &str = "/api/ipam/services/";

/// REST endpoints used to resolve references
pub const DEVICES_ENDPOINT: &str = "/api/dcim/devices/";
pub const VIRTUAL_MACHINES_ENDPOINT: &str = "/api/virtualization/virtual-machines/";
pub const IP_ADDRESSES_ENDPOINT: &str = "/api/ipam/ip-addresses/";

/// Query parameter keys used for lookups
pub const Q_NAME: &str = "name";
pub const Q_ADDRESS: &str = "address";
pub const Q_DEVICE_ID: &str = "device_id";
pub const Q_VIRTUAL_MACHINE_ID: &str = "virtual_machine_id";

/// IANA protocol numbers accepted for a service
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;
pub const PROTO_SCTP: u8 = 132;

/// Scheme prefix of the Authorization header value
pub const TOKEN_SCHEME: &str = "Token";

/// Environment fallbacks for the connection arguments
pub const ENV_URL: &str = "NETBOX_URL";
pub const ENV_TOKEN: &str = "NETBOX_TOKEN";
