use crate::config::MeterConfig;
use crate::models::DeviceProtocol;
use crate::mqtt::ha_interface::{HAPlatform, HaComponent, HaDiscover};
use crate::mqtt::{publish_protocol_count, send_transmission, SubscribeData, Transmission};
use crate::{get_id, get_unix_ts, MeteringData};
use log::{debug, error, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

pub mod structs;
pub mod bitfield;
pub mod meter_definitions;
pub mod parser;
pub mod utils;

pub use parser::decode_packet;
pub use structs::{RawPacket, Reading};

/// Custom error types for UT61E packet parsing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Ut61eParseError {
    #[error("Fixed bit {position} of byte {byte:#04x} has the wrong value")]
    MalformedFixedBit { byte: u8, position: u8 },
    #[error("Unknown function code {0:#04x}")]
    UnknownFunctionCode(u8),
    #[error("Unknown range code {range:#04x} for function {function:#04x}")]
    UnknownRangeCode { function: u8, range: u8 },
    #[error("Invalid digit code {0:#04x}")]
    InvalidDigitCode(u8),
    #[error("AC and DC indicated at the same time")]
    ConflictingPolarity,
    #[error("Packet has {0} bytes, expected 12")]
    InvalidPacketLength(usize),
    #[error("Non hex string received: {0:?}")]
    InvalidHex(String),
}

/// How often the packet counters are published
const COUNTER_INTERVAL: Duration = Duration::from_secs(60);

pub struct Ut61eManager {
    sender: Sender<Transmission>,
    config: MeterConfig,
    ha_enabled: bool,
    decoded: u32,
    failed: u32,
}

impl Ut61eManager {
    pub fn new(sender: Sender<Transmission>, config: MeterConfig, ha_enabled: bool) -> Self {
        return Ut61eManager {
            sender,
            config,
            ha_enabled,
            decoded: 0,
            failed: 0,
        };
    }

    pub async fn start_thread(&mut self) {
        info!("Starting UT61E thread for meter {}", self.config.name);

        /* The frame source publishes every packet as hex string */
        let (sender, mut receiver) = tokio::sync::mpsc::channel(10);
        let register = Transmission::Subscribe(SubscribeData {
            topic: self.config.input_topic.clone(),
            sender,
        });
        if !send_transmission(&self.sender, register, "UT61E subscription").await {
            return;
        }

        if self.ha_enabled {
            let discovery = Transmission::AutoDiscovery(get_discovery(&self.config.name));
            send_transmission(&self.sender, discovery, "UT61E discovery").await;
        }

        let mut counters = tokio::time::interval(COUNTER_INTERVAL);

        info!("Starting UT61E waiting for packets");
        loop {
            tokio::select! {
                message = receiver.recv() => {
                    match message {
                        Some(payload) => self.handle_message(&payload).await,
                        None => {
                            warn!("UT61E input channel closed");
                            return;
                        }
                    }
                }
                _ = counters.tick() => {
                    publish_protocol_count(&self.sender, "ut61e/decoded", self.decoded).await;
                    publish_protocol_count(&self.sender, "ut61e/failed", self.failed).await;
                }
            }
        }
    }

    async fn handle_message(&mut self, payload: &str) {
        debug!("Received UT61E packet: {}", payload.trim());

        match parse_ut61e_message(payload, &self.config.name) {
            Ok(metering_data) => {
                self.decoded = self.decoded.wrapping_add(1);
                if let Err(e) = self.sender.send(Transmission::Metering(metering_data)).await {
                    error!("Failed to send UT61E metering data: {}", e);
                }
            }
            Err(e) => {
                self.failed = self.failed.wrapping_add(1);
                error!("UT61E packet can not be parsed: {e}");
            }
        }
    }
}

/// Decodes one hex encoded packet and wraps the reading for the MQTT thread
pub fn parse_ut61e_message(payload: &str, meter_name: &String) -> Result<MeteringData, Ut61eParseError> {
    let packet = utils::packet_from_hex(payload)?;
    let reading = decode_packet(&packet)?;
    Ok(reading_to_metering_data(&reading, meter_name))
}

pub fn reading_to_metering_data(reading: &Reading, meter_name: &String) -> MeteringData {
    let mut mr = MeteringData::new();
    mr.id = get_id("ut61e".to_string(), meter_name);
    mr.meter_name = meter_name.clone();
    mr.protocol = DeviceProtocol::UT61E;
    mr.transmission_time = get_unix_ts();
    mr.metered_time = mr.transmission_time;

    match serde_json::to_value(reading) {
        Ok(serde_json::Value::Object(values)) => mr.metered_values = values,
        Ok(other) => error!("Reading serialized to unexpected JSON {other}"),
        Err(e) => error!("Reading can not be serialized: {e}"),
    }

    return mr;
}

/// Home Assistant device with one component per published field
pub fn get_discovery(meter_name: &String) -> HaDiscover {
    let proto = DeviceProtocol::UT61E.to_string();
    let mut discover = HaDiscover::new(meter_name.clone(), "UNI-T".to_string(), "UT61E".to_string(), proto.clone());

    let sensors = [
        ("value", "measurement"),
        ("display_value", "measurement"),
        ("display_unit", "NONE"),
        ("mode", "NONE"),
        ("operation", "NONE"),
    ];
    for (name, state_class) in sensors {
        let cmp = HaComponent::new(HAPlatform::Sensor, meter_name.clone(), "NONE".to_string(),
                                   "NONE".to_string(), proto.clone(), name.to_string(), state_class.to_string());
        discover.add_component(name, cmp);
    }

    for name in ["battery_low", "hold"] {
        let dclass = if name == "battery_low" { "battery" } else { "NONE" };
        let cmp = HaComponent::new(HAPlatform::BinarySensor, meter_name.clone(), dclass.to_string(),
                                   "NONE".to_string(), proto.clone(), name.to_string(), "NONE".to_string());
        discover.add_component(name, cmp);
    }

    return discover;
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLTAGE_PACKET: &str = "30 32 32 30 30 30 3B 30 30 30 3A 30";

    #[test]
    fn test_parse_ut61e_message() {
        let name = "bench".to_string();
        let mr = parse_ut61e_message(VOLTAGE_PACKET, &name).unwrap();

        assert_eq!(mr.protocol, DeviceProtocol::UT61E);
        assert_eq!(mr.meter_name, "bench");
        assert!(mr.id.starts_with("ut61e-bench-"));
        assert_eq!(mr.metered_values["mode"], "voltage");
        assert_eq!(mr.metered_values["display_value"], 2.2);
        assert_eq!(mr.metered_values["currentType"], "DC");
        assert_eq!(mr.metered_values["range"], "auto");

        let keys: Vec<&str> = mr.metered_values.keys().map(|k| k.as_str()).collect();
        for key in ["value", "unit", "display_value", "display_unit", "mode", "currentType",
                    "peak", "relative", "hold", "range", "operation", "battery_low"] {
            assert!(keys.contains(&key), "missing {key}");
        }
    }

    #[test]
    fn test_parse_invalid_message() {
        let name = "bench".to_string();
        assert!(parse_ut61e_message("not hex", &name).is_err());
        assert_eq!(parse_ut61e_message("30 32 32 30 30 30 37 30 30 30 3A 30", &name).unwrap_err(),
                   Ut61eParseError::UnknownFunctionCode(0x37));
    }

    #[test]
    fn test_discovery() {
        let disc = get_discovery(&"bench".to_string());
        assert_eq!(disc.discover_topic, "homeassistant/device/u2m_UT61E-bench/config");
        assert_eq!(disc.state_topic, "ut61e2mqtt/devs/UT61E/bench");
        assert_eq!(disc.cmps.len(), 7);
        assert_eq!(disc.cmps["battery_low"]["p"], "binary_sensor");
        assert_eq!(disc.cmps["battery_low"]["device_class"], "battery");
        assert_eq!(disc.cmps["value"]["value_template"], "{{ value_json.value }}");
    }

    #[tokio::test]
    async fn test_manager_registers_and_discovers() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let config = MeterConfig { name: "bench".to_string(), input_topic: "ut61e_input".to_string() };
        let mut manager = Ut61eManager::new(tx, config, true);
        let task = tokio::spawn(async move { manager.start_thread().await });

        let input = match rx.recv().await {
            Some(Transmission::Subscribe(s)) => {
                assert_eq!(s.topic, "ut61e_input");
                s.sender
            }
            _ => panic!("expected subscription"),
        };
        match rx.recv().await {
            Some(Transmission::AutoDiscovery(d)) => assert_eq!(d.state_topic, "ut61e2mqtt/devs/UT61E/bench"),
            _ => panic!("expected discovery"),
        }

        /* closing the input ends the manager */
        drop(input);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_manager_stops_without_mqtt_thread() {
        let (tx, rx) = tokio::sync::mpsc::channel(10);
        drop(rx);
        let config = MeterConfig { name: "bench".to_string(), input_topic: "ut61e_input".to_string() };
        let mut manager = Ut61eManager::new(tx, config, true);
        manager.start_thread().await;
    }

    #[tokio::test]
    async fn test_manager_forwards_readings() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let config = MeterConfig { name: "bench".to_string(), input_topic: "ut61e_input".to_string() };
        let mut manager = Ut61eManager::new(tx, config, false);

        manager.handle_message(VOLTAGE_PACKET).await;
        manager.handle_message("30 30").await;

        match rx.try_recv() {
            Ok(Transmission::Metering(mr)) => assert_eq!(mr.metered_values["unit"], "V"),
            _ => panic!("expected metering data"),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.decoded, 1);
        assert_eq!(manager.failed, 1);
    }
}
