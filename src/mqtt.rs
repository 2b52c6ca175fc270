use anyhow::{bail, Context, Result};
use rumqttc::{Client, Event, MqttOptions, Outgoing, QoS};
use serde::Deserialize;
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    host: String,
    #[serde(default = "MqttConfig::default_port")]
    port: u16,
    username: Option<String>,
    password: Option<String>,
    #[serde(default = "MqttConfig::default_topic")]
    topic: String,
    #[serde(default = "MqttConfig::default_qos")]
    qos: u8,
    #[serde(default = "MqttConfig::default_client_id")]
    client_id: String,
    #[serde(
        default = "MqttConfig::default_keep_alive",
        with = "humantime_serde"
    )]
    keep_alive: Duration,
}

impl MqttConfig {
    fn default_port() -> u16 {
        1883
    }

    fn default_topic() -> String {
        "mgev".into()
    }

    fn default_qos() -> u8 {
        0
    }

    fn generate_random_string(len: usize) -> String {
        use rand::distributions::Alphanumeric;
        use rand::Rng;

        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    fn default_client_id() -> String {
        format!("mgev-bms-{}", Self::generate_random_string(8))
    }

    fn default_keep_alive() -> Duration {
        Duration::from_secs(30)
    }

    pub const DEFAULT_CONFIG_FILE: &str = "mqtt.yaml";

    pub fn load(config_file_path: &str) -> Result<Self> {
        log::debug!("Loading config file from {config_file_path:?}");
        let config_file = std::fs::File::open(config_file_path)
            .with_context(|| format!("Cannot open MQTT config file {config_file_path:?}"))?;
        let config: Self = serde_yaml::from_reader(&config_file)
            .with_context(|| format!("Cannot read MQTT config from file: {config_file_path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings `rumqttc` would panic on.
    fn validate(&self) -> Result<()> {
        self.qos()?;
        if self.keep_alive < Duration::from_secs(5) {
            bail!("MQTT keep_alive must be at least 5s");
        }
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            bail!("Invalid MQTT client_id {:?}", self.client_id);
        }
        Ok(())
    }

    fn qos(&self) -> Result<QoS> {
        Ok(match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            other => bail!("Invalid MQTT QoS {other}"),
        })
    }
}

pub struct MqttPublisher {
    client: Client,
    qos: QoS,
    config: MqttConfig,
    connection: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    pub fn new(config: MqttConfig) -> Result<Self> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        log::info!(
            "Connecting to MQTT broker: {}:{} with client_id: {}",
            config.host,
            config.port,
            config.client_id
        );
        let (client, mut connection) = Client::new(options, 64);
        let connection = std::thread::Builder::new()
            .name("mqtt".into())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                        Ok(event) => log::trace!("MQTT event: {event:?}"),
                        Err(e) => {
                            log::error!("MQTT connection error: {e}");
                            break;
                        }
                    }
                }
            })
            .with_context(|| "Cannot spawn MQTT connection thread")?;
        Ok(Self {
            client,
            qos: config.qos()?,
            config,
            connection: Some(connection),
        })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    pub fn publish(&mut self, topic: &str, payload: &str) -> Result<()> {
        log::debug!(
            "Publishing to MQTT: Topic='{}', Payload='{payload}', QoS={:?}",
            topic,
            self.qos
        );
        self.client
            .publish(topic, self.qos, false, payload.as_bytes().to_vec())
            .with_context(|| format!("Failed to publish message to MQTT topic: {}", topic))
    }

    /// Disconnects once the queued messages have been sent.
    pub fn finish(mut self) -> Result<()> {
        self.client
            .disconnect()
            .with_context(|| "Failed to disconnect from MQTT broker")?;
        if let Some(connection) = self.connection.take() {
            if connection.join().is_err() {
                bail!("MQTT connection thread panicked");
            }
        }
        log::info!("Disconnected from MQTT broker.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_yaml(yaml: &str) -> Result<MqttConfig> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(yaml.as_bytes())?;
        let path = file.path().to_str().context("Temp path is not UTF-8")?;
        MqttConfig::load(path)
    }

    #[test]
    fn defaults() {
        let config = load_yaml("host: localhost\n").unwrap();
        assert_eq!(config.port, 1883);
        assert_eq!(config.topic, "mgev");
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert!(config.client_id.starts_with("mgev-bms-"));
        assert_eq!(config.client_id.len(), "mgev-bms-".len() + 8);
    }

    #[test]
    fn keep_alive_in_humantime_format() {
        let config = load_yaml("host: localhost\nkeep_alive: 1m 30s\n").unwrap();
        assert_eq!(config.keep_alive, Duration::from_secs(90));
        assert!(load_yaml("host: localhost\nkeep_alive: 2s\n").is_err());
        assert!(load_yaml("host: localhost\nkeep_alive: soon\n").is_err());
    }

    #[test]
    fn rejects_invalid_client_id() {
        assert!(load_yaml("host: localhost\nclient_id: \"\"\n").is_err());
        assert!(load_yaml("host: localhost\nclient_id: \" bms\"\n").is_err());
        let config = load_yaml("host: localhost\nclient_id: bms-1\n").unwrap();
        assert_eq!(config.client_id, "bms-1");
    }

    #[test]
    fn rejects_invalid_qos() {
        assert!(load_yaml("host: localhost\nqos: 3\n").is_err());
        let config = load_yaml("host: localhost\nqos: 2\n").unwrap();
        assert_eq!(config.qos().unwrap(), QoS::ExactlyOnce);
    }
}
