use log::error;
use serde::{Deserialize, Serialize};

use super::BASE_TOPIC;

#[derive(Serialize)]
pub struct HaDevice {
    ids: String,
    name: String,
    manufacturer: String,
    model: String,
}

#[derive(Serialize)]
pub struct HaOrigin {
    pub name: String,
    pub sw_version: String,
}

fn is_none_str(value: &String) -> bool {
    if value.is_empty() || value == "NONE" {
        return true;
    }
    return false;
}

#[derive(Serialize, PartialEq, Deserialize, Clone, Default)]
pub enum HAPlatform {
    #[default]
    Sensor,
    BinarySensor,
}

impl HAPlatform {
    pub fn to_string(&self) -> String {
        match self {
            HAPlatform::Sensor => "sensor".to_string(),
            HAPlatform::BinarySensor => "binary_sensor".to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct HaComponent {
    pub p: String,
    pub name: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub device_class: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub unit_of_measurement: String,
    pub value_template: String,
    pub unique_id: String,
    pub object_id: String,
    pub via_device: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub state_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<bool>,
}

impl HaComponent {
    pub fn new(platform: HAPlatform, device: String, dclass: String, uof: String, proto: String, name: String, state_class: String) -> Self {

        let safe_name = name.clone().replace(" ", "_");

        let mut p_off = None;
        let mut p_on = None;

        if platform == HAPlatform::BinarySensor {
            p_off = Some(false);
            p_on = Some(true);
        }

        return HaComponent {
            p: platform.to_string(),
            name: name.clone(),
            device_class: dclass,
            unit_of_measurement: uof,
            value_template: format!("{{{{ value_json.{name} }}}}"),
            unique_id: format!("u2m_{proto}_{device}_{safe_name}").to_lowercase(),
            object_id: format!("{device}_{safe_name}").to_lowercase(),
            state_class: state_class,
            payload_on: p_on,
            payload_off: p_off,
            via_device: "u2m_management".to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct HaDiscover {
    pub dev: HaDevice,
    pub o: HaOrigin,
    pub cmps: serde_json::Map<String, serde_json::Value>,
    pub state_topic: String,
    pub qos: u32,
    #[serde(skip_serializing)]
    pub discover_topic: String,
}

impl HaDiscover {
    pub fn new(name: String, manu: String, model: String, proto: String) -> Self {
        return HaDiscover {
            discover_topic: format!("homeassistant/device/u2m_{}-{}/config", proto, name),
            dev: HaDevice {
                ids: format!("u2m_{}_{}", proto, name),
                name: name.clone(),
                manufacturer: manu,
                model: model,
            },
            o: HaOrigin {
                name: "ut61e2mqtt".to_string(),
                sw_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            cmps: serde_json::Map::new(),
            state_topic: format!("{BASE_TOPIC}/devs/{}/{}", proto, name),
            qos: 2
        }
    }

    pub fn add_component(&mut self, key: &str, cmp: HaComponent) {
        match serde_json::to_value(cmp) {
            Ok(v) => { self.cmps.insert(key.to_string(), v); },
            Err(e) => { error!("Component {key} can not be serialized: {e}"); },
        }
    }
}
