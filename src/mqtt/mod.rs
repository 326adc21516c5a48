pub mod internal_commands;
pub mod ha_interface;

use std::collections::HashMap;
use lazy_static::lazy_static;
use tokio::sync::RwLock;
use crate::mqtt::ha_interface::HaDiscover;
use crate::config::{ConfigBases, MqttConfig, ReportConfig};
use crate::models::DeviceProtocol;
use crate::{get_config_or_panic, CONFIG};
use log::{debug, error, info};
use tokio::sync::mpsc::{Receiver, Sender};
use serde::{Serialize, Deserialize};
use serde_json;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::{Duration, Instant};

/// Prefix of every topic the bridge publishes or subscribes to
pub const BASE_TOPIC: &str = "ut61e2mqtt";

#[derive(Clone)]
pub struct AppStatus {
    pub start_time: Instant,
}

impl AppStatus {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeteringData {
    pub id: String,
    pub meter_name: String,
    pub protocol: DeviceProtocol,
    pub transmission_time: u64,
    pub metered_time: u64,
    pub metered_values: serde_json::Map<String, serde_json::Value>
}

impl MeteringData {
    pub fn new() -> Self {
        return MeteringData {
            id: "".to_string(),
            meter_name: "".to_string(),
            protocol: DeviceProtocol::Unknown,
            transmission_time: 0,
            metered_time: 0,
            metered_values: serde_json::Map::new()
        };
    }
}

pub struct PublishData {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

pub struct SubscribeData {
    pub topic: String,
    pub sender: tokio::sync::mpsc::Sender<String>
}

pub enum Transmission {
    Metering(MeteringData),
    AutoDiscovery(HaDiscover),
    Subscribe(SubscribeData),
    Publish(PublishData)
}

pub struct MqttManager {
    rx: Receiver<Transmission>,
    exit_thread: bool,
    client: AsyncClient,
    client_name: String,
    report: ReportConfig,
}

pub struct Callbacks {
    calls: HashMap<String, Vec<tokio::sync::mpsc::Sender<String>>>,
}

impl Callbacks {
    pub fn new() -> Self {
        return Callbacks { calls: HashMap::new() };
    }

    pub fn insert(&mut self, topic: String, callback: tokio::sync::mpsc::Sender<String>) {
        debug!("Adding callback to topic {topic}");
        self.calls.entry(topic).or_default().push(callback);
    }

    pub async fn send(&self, topic: String, payload: String) {
        let Some(v) = self.calls.get(&topic) else {
            debug!("Send for unknown topic {topic}");
            return;
        };

        for call in v {
            debug!("Sending to callback: {payload}");
            if let Err(e) = call.send(payload.clone()).await {
                error!("Callback for {topic} is gone: {e}");
            }
        }
    }

    pub async fn get_topics(&self) -> Vec<String> {
        return self.calls.keys().cloned().collect();
    }
}

lazy_static! {
    pub static ref CALLBACKS: RwLock<Callbacks> = RwLock::new(Callbacks::new());
    pub static ref APP_STATUS: RwLock<AppStatus> = RwLock::new(AppStatus::new());
}

/// Turns the value into a plain payload, strings without the JSON quotes
fn value_payload(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

/// All (topic, payload) pairs for one reading besides the raw envelope
pub fn metering_messages(data: &MeteringData, report: &ReportConfig) -> Vec<(String, String)> {
    let device_topic = format!("{BASE_TOPIC}/devs/{}/{}", data.protocol.to_string(), data.meter_name);
    let mut messages = Vec::new();

    if report.json {
        match serde_json::to_string(&data.metered_values) {
            Ok(payload) => messages.push((device_topic.clone(), payload)),
            Err(e) => error!("Unable to serialize values of {}: {e}", data.meter_name),
        }
    }

    if report.separate {
        for (key, value) in data.metered_values.iter() {
            messages.push((format!("{device_topic}/{key}"), value_payload(value)));
        }
    }

    return messages;
}

impl MqttManager {
    pub fn new() -> Result<(Self, Sender<Transmission>), std::io::Error> {
        let (mtx, mrx) = tokio::sync::mpsc::channel(100);

        info!("MQTT connection starting up");
        let config: MqttConfig = get_config_or_panic!("mqtt", ConfigBases::Mqtt);
        let report: ReportConfig = get_config_or_panic!("report", ConfigBases::Report);

        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        mqttoptions.set_credentials(config.user.clone(), config.pass.clone());

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        // Spawn a new task to handle the incoming messages
        let reconnect_c = client.clone();
        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        let topic = p.topic;
                        let payload = match String::from_utf8(p.payload.to_vec()) {
                            Ok(s) => s,
                            Err(_) => {
                                error!("Non UTF-8 payload received on {topic}");
                                continue;
                            }
                        };
                        debug!("Received MQTT message on {topic}: {payload:?}");

                        let callback = CALLBACKS.read().await;
                        callback.send(topic, payload).await;
                    },
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected, resubscribing everything");

                        /* We are connected, resubscribe to everything */
                        let topics = CALLBACKS.read().await.get_topics().await;
                        for topic in topics {
                            let client_clone = reconnect_c.clone();
                            tokio::spawn(async move {
                                if let Err(e) = client_clone.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                                    error!("Resubscribing {topic} failed: {e}");
                                }
                            });
                        }
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting ", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        return Ok((MqttManager {
            client: client,
            rx: mrx,
            exit_thread: false,
            client_name: config.client_name,
            report: report,
        }, mtx));
    }

    async fn publish_startup(&self) {
        let topic = format!("{BASE_TOPIC}/{}", self.report.status_topic);
        let payload = serde_json::json!({ "status": "online", "client": self.client_name }).to_string();
        if let Err(e) = self.client.publish(topic, QoS::AtLeastOnce, false, payload).await {
            error!("Unable to publish startup status: {e}");
        }
    }

    pub async fn start_thread(&mut self) {
        self.publish_startup().await;

        // Handle all the incoming metering stuff
        while !self.exit_thread {
            let Some(transmission) = self.rx.recv().await else {
                debug!("Reading returned none, we exit now");
                self.exit_thread = true;
                continue;
            };

            match transmission {
                Transmission::Metering(data) => {
                    info!("Metering data received: {}", data.id);
                    match serde_json::to_string(&data) {
                        Ok(raw) => match self.client.publish(format!("{BASE_TOPIC}/raw"), QoS::AtLeastOnce, false, raw).await {
                            Err(e) => { error!("Error sending: {}", e); },
                            Ok(_) => { debug!("Send successfully"); }
                        },
                        Err(e) => { error!("Unable to serialize metering data: {e}"); }
                    }

                    for (topic, payload) in metering_messages(&data, &self.report) {
                        if let Err(e) = self.client.publish(topic, QoS::AtLeastOnce, false, payload).await {
                            error!("Error sending: {}", e);
                        }
                    }
                },
                Transmission::AutoDiscovery(disc) => {
                    match serde_json::to_string(&disc) {
                        Ok(payload) => {
                            if let Err(e) = self.client.publish(disc.discover_topic.clone(), QoS::AtLeastOnce, true, payload).await {
                                error!("Unable to publish discovery for {}: {e}", disc.discover_topic);
                            }
                        },
                        Err(e) => { error!("Unable to serialize discovery: {e}"); }
                    }
                },
                Transmission::Subscribe(subscribe_data) => {
                    let topic = format!("{BASE_TOPIC}/{}", subscribe_data.topic);
                    match self.client.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                        Ok(_) => {
                            CALLBACKS.write().await.insert(topic.clone(), subscribe_data.sender);
                            info!("Registered Callback {topic}");
                        },
                        Err(e) => { error!("Unable to subscribe {topic}: {e}"); }
                    }
                },
                Transmission::Publish(publish_data) => {
                    match self.client.publish(
                        publish_data.topic,
                        match publish_data.qos {
                            0 => QoS::AtMostOnce,
                            1 => QoS::AtLeastOnce,
                            2 => QoS::ExactlyOnce,
                            _ => QoS::AtMostOnce,
                        },
                        publish_data.retain,
                        publish_data.payload
                    ).await {
                        Err(e) => { error!("Error publishing: {}", e); },
                        Ok(_) => { debug!("Published successfully"); }
                    }
                },
            };
        }

        info!("MQTT thread exit");
    }
}

/// Hands a transmission to the MQTT thread, false if that thread is gone
pub async fn send_transmission(mqtt_sender: &Sender<Transmission>, transmission: Transmission, what: &str) -> bool {
    if let Err(e) = mqtt_sender.send(transmission).await {
        error!("Unable to send {what} to the MQTT thread: {e}");
        return false;
    }
    return true;
}

pub async fn get_app_status() -> AppStatus {
    APP_STATUS.read().await.clone()
}

pub async fn publish_uptime(mqtt_sender: &Sender<Transmission>) {
    let app_status = get_app_status().await;

    let uptime_publish = PublishData {
        topic: format!("{BASE_TOPIC}/mgt/uptime"),
        payload: app_status.uptime_seconds().to_string(),
        qos: 1,
        retain: true,
    };
    send_transmission(mqtt_sender, Transmission::Publish(uptime_publish), "uptime").await;
}

pub async fn publish_protocol_count(mqtt_sender: &Sender<Transmission>, counter: &str, count: u32) {
    let count_publish = PublishData {
        topic: format!("{BASE_TOPIC}/mgt/{}", counter),
        payload: count.to_string(),
        qos: 1,
        retain: true,
    };
    send_transmission(mqtt_sender, Transmission::Publish(count_publish), counter).await;
}
