use std::fmt;
use std::time::Duration;

use rumqttc::Outgoing;
use rumqttc::v5::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, mqttbytes::QoS,
    mqttbytes::v5::Packet,
};

use tokio::task::JoinHandle;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info, trace, warn};

use crate::error::Result;

// The capacity of the bounded asynchronous channel.
const ASYNC_CHANNEL_CAPACITY: usize = 10;

// Keep alive time to send `pingreq` to broker when the connection is idle.
const KEEP_ALIVE_TIME: Duration = Duration::from_secs(5);

// Pause before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

// Bound on the wait for the disconnect packet to leave.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// The logical channels a reading is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Temperature in degrees Celsius.
    Temperature,
    /// Relative humidity as a percentage.
    Humidity,
}

impl Channel {
    /// Returns the topic name of the channel, without prefix.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        }
    }

    /// Returns the full topic of the channel under `prefix`.
    #[must_use]
    pub fn topic(self, prefix: &str) -> String {
        if prefix.is_empty() {
            self.name().to_string()
        } else {
            format!("{}/{}", prefix.trim_end_matches('/'), self.name())
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A sink for labeled sensor values.
///
/// Delivery is fire-and-forget: an implementation only reports whether
/// the value was accepted for delivery, and must not wait for the
/// transport to make room.
pub trait Publish {
    /// Publishes `value` on `channel`.
    fn publish(&self, channel: Channel, value: String) -> impl Future<Output = Result<()>>;
}

/// Broker connection settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker host name or IP address.
    pub host: String,
    /// Broker port number.
    pub port: u16,
    /// Client identifier.
    pub client_id: String,
    /// Username and password.
    pub credentials: Option<(String, String)>,
    /// Prefix of all topics.
    pub topic_prefix: String,
    /// Quality of service of the published messages.
    pub qos: QoS,
}

impl BrokerConfig {
    fn mqtt_options(&self) -> MqttOptions {
        let mut mqttoptions =
            MqttOptions::new(self.client_id.as_str(), self.host.as_str(), self.port);
        let _ = mqttoptions
            .set_keep_alive(KEEP_ALIVE_TIME)
            .set_clean_start(true);
        if let Some((username, password)) = &self.credentials {
            let _ = mqttoptions.set_credentials(username.as_str(), password.as_str());
        }
        mqttoptions
    }
}

// The session is over once the disconnect packet has been sent.
#[inline]
fn ends_session(event: &std::result::Result<Event, ConnectionError>) -> bool {
    matches!(event, Ok(Event::Outgoing(Outgoing::Disconnect)))
}

#[inline]
fn log_event(event: &std::result::Result<Event, ConnectionError>) -> bool {
    match event {
        Ok(Event::Incoming(Packet::ConnAck(_))) => {
            info!("Connected to the broker");
            true
        }
        Ok(Event::Incoming(Packet::Disconnect(disconnect))) => {
            info!("Disconnected by the broker: {disconnect:?}");
            true
        }
        Ok(event) => {
            trace!("MQTT event: {:?}", event);
            true
        }
        Err(e) => {
            error!("Connection to the broker failed: {e}");
            false
        }
    }
}

async fn run_event_loop(mut eventloop: EventLoop, cancellation_token: CancellationToken) {
    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            // Drive the outgoing publications and the incoming acknowledgements
            event = eventloop.poll() => {
                if ends_session(&event) {
                    debug!("Disconnect packet sent");
                    break;
                }
                if !log_event(&event) {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
    drop(eventloop);
}

/// A [`Publish`] implementation backed by an `MQTT` client.
///
/// The client event loop runs on a background task until
/// [`disconnect`](Self::disconnect) is called.
#[derive(Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
    topic_prefix: String,
    qos: QoS,
    cancellation_token: CancellationToken,
    event_handle: JoinHandle<()>,
}

impl MqttPublisher {
    /// Creates an [`MqttPublisher`] and starts connecting to the broker.
    ///
    /// Must be called within a `tokio` runtime.
    #[must_use]
    pub fn connect(config: &BrokerConfig) -> Self {
        info!(
            "Connecting to broker {}:{} as `{}`",
            config.host, config.port, config.client_id
        );

        let (client, eventloop) = AsyncClient::new(config.mqtt_options(), ASYNC_CHANNEL_CAPACITY);
        let cancellation_token = CancellationToken::new();
        let event_handle = tokio::spawn(run_event_loop(eventloop, cancellation_token.clone()));

        Self {
            client,
            topic_prefix: config.topic_prefix.clone(),
            qos: config.qos,
            cancellation_token,
            event_handle,
        }
    }

    /// Disconnects from the broker and stops the event loop.
    ///
    /// The event loop ends as soon as the disconnect packet is sent. If
    /// that does not happen within a short bound, typically because the
    /// broker is unreachable, the event loop is cancelled.
    pub async fn disconnect(mut self) {
        if let Err(e) = self.client.try_disconnect() {
            error!("Failed to disconnect from the broker: {e}");
            self.cancellation_token.cancel();
        }

        let joined =
            match tokio::time::timeout(DISCONNECT_TIMEOUT, &mut self.event_handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Disconnect packet not sent, stopping the event loop");
                    self.cancellation_token.cancel();
                    (&mut self.event_handle).await
                }
            };

        if let Err(e) = joined {
            error!("Failed to await the event loop task: {e}");
        }
        info!("Disconnected from the broker");
    }
}

impl Publish for MqttPublisher {
    // A full request queue means the broker is not keeping up: the value
    // is dropped instead of waiting for room.
    async fn publish(&self, channel: Channel, value: String) -> Result<()> {
        let topic = channel.topic(&self.topic_prefix);
        debug!("Publishing `{value}` on `{topic}`");

        self.client
            .try_publish(topic.as_str(), self.qos, false, value)
            .map_err(|e| {
                error!("Impossible to publish on topic {topic}: {e}");
                e.into()
            })
    }
}
