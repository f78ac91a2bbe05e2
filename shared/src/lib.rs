pub mod coerce;
pub mod protocol;
pub mod types;
