use std::num::NonZeroUsize;
use std::time::Duration;

use clap::{ArgAction, Parser};

use rumqttc::v5::mqttbytes::QoS;

use tracing::Level;

use crate::publisher::BrokerConfig;
use crate::relay::Schedule;

fn parse_qos(level: &str) -> Result<QoS, String> {
    match level {
        "0" => Ok(QoS::AtMostOnce),
        "1" => Ok(QoS::AtLeastOnce),
        "2" => Ok(QoS::ExactlyOnce),
        _ => Err(format!("`{level}` is not a QoS level, expected 0, 1 or 2")),
    }
}

/// Reads a `DHT22` sensor and publishes its values to an `MQTT` broker.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Broker host name or IP address.
    #[arg(long, default_value = "127.0.0.1")]
    pub broker: String,

    /// Broker port.
    #[arg(short, long, default_value_t = 1883)]
    pub port: u16,

    /// Client identifier presented to the broker.
    #[arg(long, default_value = "humiture")]
    pub client_id: String,

    /// Username for broker authentication.
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password for broker authentication.
    #[arg(long, requires = "username")]
    pub password: Option<String>,

    /// Prefix of the `temperature` and `humidity` topics.
    #[arg(long, default_value = "DHT22")]
    pub topic_prefix: String,

    /// Quality of service of the published messages (0, 1 or 2).
    #[arg(long, default_value = "0", value_parser = parse_qos)]
    pub qos: QoS,

    /// BCM number of the sensor data pin.
    #[arg(long, default_value_t = 24)]
    pub pin: u8,

    /// Milliseconds to wait before each acquisition cycle.
    #[arg(long, default_value_t = 3000)]
    pub period_ms: u64,

    /// Exit after this many successful publications.
    #[arg(short, long)]
    pub count: Option<NonZeroUsize>,

    /// Increases log verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Returns the broker connection settings.
    #[must_use]
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            host: self.broker.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            credentials: self.username.clone().map(|username| {
                let password = self.password.clone().unwrap_or_default();
                (username, password)
            }),
            topic_prefix: self.topic_prefix.clone(),
            qos: self.qos,
        }
    }

    /// Returns the acquisition schedule.
    #[must_use]
    pub const fn schedule(&self) -> Schedule {
        Schedule {
            period: Duration::from_millis(self.period_ms),
            max_publications: self.count,
        }
    }

    /// Returns the maximum log level.
    #[must_use]
    pub const fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}
