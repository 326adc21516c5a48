use log::{info, warn};
use serde_json::json;
use tokio::sync::mpsc::Sender;
use crate::mqtt::{send_transmission, PublishData, SubscribeData, Transmission, BASE_TOPIC};

pub struct CommandHandler {
   sender: Sender<Transmission>,
}

/// Discovery document of the bridge itself, the meters link to it with via_device
pub fn bridge_discovery() -> serde_json::Value {
    return json!({
        "dev": {
            "ids": "u2m_management",
            "name": "ut61e2mqtt Bridge",
            "manufacturer": "ut61e2mqtt",
            "model": "Bridge"
        },
        "o": {
            "name": "ut61e2mqtt",
            "sw_version": env!("CARGO_PKG_VERSION")
        },
        "cmps": {
            "restart": {
                "p": "button",
                "device_class": "restart",
                "name": "restart",
                "object_id": "bridge_restart",
                "payload_press": "restart",
                "unique_id": "u2m_management_bridge_restart",
                "command_topic": format!("{BASE_TOPIC}/mgt/command")
            },
            "uptime": {
                "p": "sensor",
                "name": "uptime",
                "object_id": "uptime",
                "unique_id": "u2m_management_uptime",
                "state_topic": format!("{BASE_TOPIC}/mgt/uptime"),
                "state_class": "measurement",
                "unit_of_measurement": "s"
            }
        }
    });
}

impl CommandHandler {

  pub fn new(sender: Sender<Transmission>) -> Self {
    return CommandHandler {
      sender: sender,
    }
  }

  pub async fn start_thread(&self) {
        info!("Starting CommandHandler thread");
        let (sender, mut receiver) = tokio::sync::mpsc::channel(10);

        let register = Transmission::Subscribe(SubscribeData{
            topic: "mgt/command".to_string(),
            sender
        });

        if !send_transmission(&self.sender, register, "command subscription").await {
            return;
        }

        let p = Transmission::Publish(PublishData {
            topic: "homeassistant/device/u2m_bridge/config".to_string(),
            payload: bridge_discovery().to_string(),
            qos: 0,
            retain: true,
        });
        send_transmission(&self.sender, p, "bridge discovery").await;

        info!("Start waiting for command messages");
        while let Some(c) = receiver.recv().await {
            info!("Received command {c}");

            match c.trim() {
                "restart" => {
                    /* if we exit that thread the rest will exit, too */
                    info!("Request to shutdown received");
                    return;
                },
                other => warn!("Unknown command {other}"),
            }
        }
  }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_discovery() {
        let v = bridge_discovery();
        assert_eq!(v["cmps"]["restart"]["command_topic"], "ut61e2mqtt/mgt/command");
        assert_eq!(v["cmps"]["uptime"]["state_topic"], "ut61e2mqtt/mgt/uptime");
        assert_eq!(v["dev"]["ids"], "u2m_management");
    }

    #[tokio::test]
    async fn test_restart_ends_handler() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        let handler = CommandHandler::new(tx);
        let task = tokio::spawn(async move { handler.start_thread().await });

        let callback = match rx.recv().await {
            Some(Transmission::Subscribe(s)) => {
                assert_eq!(s.topic, "mgt/command");
                s.sender
            }
            _ => panic!("expected subscription"),
        };
        assert!(matches!(rx.recv().await, Some(Transmission::Publish(_))));

        callback.send("status".to_string()).await.unwrap();
        callback.send("restart".to_string()).await.unwrap();
        task.await.unwrap();
    }
}
