//! Bridge for UNI-T UT61E multimeters
//!
//! Decodes the 12-byte packets of the meter (ES51922 chip) into readings
//! and publishes them to MQTT, optionally with Home Assistant discovery.

pub mod models;
pub mod mqtt;
pub mod config;
pub mod metering_ut61e;

// Re-export common types for easier access
pub use mqtt::{CALLBACKS, MeteringData};
pub use config::CONFIG;
pub use metering_ut61e::Ut61eManager;

pub fn get_unix_ts() -> u64 {
    return std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
}

pub fn get_id(protocol: String, meter_name: &String) -> String {
    return format!("{}-{}-{:?}", protocol, meter_name, get_unix_ts());
}
