use serde::{Deserialize, Serialize};

/// Protocol a MeteringData was decoded from, also part of the device topics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceProtocol {
    Unknown,
    UT61E,
}

impl DeviceProtocol {
    pub fn to_string(&self) -> String {
        match self {
            DeviceProtocol::Unknown => "Unknown".to_string(),
            DeviceProtocol::UT61E => "UT61E".to_string(),
        }
    }
}
