use lazy_static::lazy_static;
use log::info;
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the config on config/u2m.yaml or u2m.yaml")]
    NotFound,
    #[error("Unable to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("Unable to parse config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("Config section {0} not known")]
    UnknownSection(String),
}

fn mqtt_client_name_default() -> String { return "ut61e2mqtt".to_string() }

#[derive(Deserialize, Serialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub ha_enabled: bool,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
}

fn meter_name_default() -> String { return "ut61e".to_string() }
fn meter_input_topic_default() -> String { return "ut61e_input".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct MeterConfig {
    #[serde(default="meter_name_default")]
    pub name: String,
    /* Relative to the base topic */
    #[serde(default="meter_input_topic_default")]
    pub input_topic: String,
}

fn report_separate_default() -> bool { return true }
fn report_json_default() -> bool { return true }
fn report_status_topic_default() -> String { return "events".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ReportConfig {
    #[serde(default="report_separate_default")]
    pub separate: bool,
    #[serde(default="report_json_default")]
    pub json: bool,
    #[serde(default="report_status_topic_default")]
    pub status_topic: String,
}

fn meter_default() -> MeterConfig { return MeterConfig { name: meter_name_default(), input_topic: meter_input_topic_default() }}
fn report_default() -> ReportConfig {
    return ReportConfig {
        separate: report_separate_default(),
        json: report_json_default(),
        status_topic: report_status_topic_default(),
    }
}

#[derive(Deserialize, Serialize, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default="meter_default")]
    pub meter: MeterConfig,
    #[serde(default="report_default")]
    pub report: ReportConfig,
}

pub struct ConfigHolder {
    pub config: Config,
}

pub enum ConfigBases {
    Mqtt(MqttConfig),
    Meter(MeterConfig),
    Report(ReportConfig),
}

impl ConfigHolder {
    pub fn load() -> Result<Self, ConfigError> {
        /* Check for the two paths of the config file */
        for path in ["config/u2m.yaml", "u2m.yaml"] {
            if Path::new(path).exists() {
                return ConfigHolder::load_from(path);
            }
        }

        return Err(ConfigError::NotFound);
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io { path: path.display().to_string(), source };

        let mut file = File::open(path).map_err(io_err)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(io_err)?;

        info!("Loading config from {}", path.display());
        return ConfigHolder::from_str(&contents);
    }

    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let c: Config = serde_yml::from_str(contents)?;
        return Ok(ConfigHolder { config: c });
    }

    pub fn get_copy(&self, base: &str) -> Result<ConfigBases, ConfigError> {
        match base {
            "mqtt" => { return Ok(ConfigBases::Mqtt(self.config.mqtt.clone())) },
            "meter" => { return Ok(ConfigBases::Meter(self.config.meter.clone())) },
            "report" => { return Ok(ConfigBases::Report(self.config.report.clone())) },
            _ => { return Err(ConfigError::UnknownSection(base.to_string())) }
        }
    }
}

lazy_static! {
    pub static ref CONFIG: RwLock<ConfigHolder> = RwLock::new(
        ConfigHolder::load().unwrap_or_else(|e| panic!("{e}"))
    );
}

#[macro_export]
macro_rules! get_config_or_panic {
    ($base: expr, $pat: path) => {
        {
            let c = CONFIG.read().unwrap().get_copy($base).unwrap();
            if let $pat(a) = c {
                a
            } else {
                panic!(
                    "mismatch variant when cast to {}",
                    stringify!($pat));
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
mqtt:
  host: localhost
  port: 1883
  user: bridge
  pass: secret
  ha_enabled: true
"#;

    #[test]
    fn test_defaults() {
        let holder = ConfigHolder::from_str(MINIMAL).unwrap();
        let c = &holder.config;
        assert_eq!(c.mqtt.client_name, "ut61e2mqtt");
        assert_eq!(c.meter, MeterConfig { name: "ut61e".to_string(), input_topic: "ut61e_input".to_string() });
        assert!(c.report.separate);
        assert!(c.report.json);
        assert_eq!(c.report.status_topic, "events");
    }

    #[test]
    fn test_sections_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{MINIMAL}meter:\n  name: bench\nreport:\n  separate: false\n").unwrap();

        let holder = ConfigHolder::load_from(file.path()).unwrap();
        match holder.get_copy("meter").unwrap() {
            ConfigBases::Meter(m) => {
                assert_eq!(m.name, "bench");
                assert_eq!(m.input_topic, "ut61e_input");
            }
            _ => panic!("wrong section"),
        }
        match holder.get_copy("report").unwrap() {
            ConfigBases::Report(r) => {
                assert!(!r.separate);
                assert!(r.json);
            }
            _ => panic!("wrong section"),
        }
        assert!(matches!(holder.get_copy("modbus"), Err(ConfigError::UnknownSection(_))));
    }

    #[test]
    fn test_broken_config() {
        assert!(matches!(ConfigHolder::from_str("mqtt: [1, 2"), Err(ConfigError::Parse(_))));
        assert!(matches!(ConfigHolder::from_str("meter:\n  name: x\n"), Err(ConfigError::Parse(_))));
        assert!(matches!(ConfigHolder::load_from("/nonexistent/u2m.yaml"), Err(ConfigError::Io { .. })));
    }
}
