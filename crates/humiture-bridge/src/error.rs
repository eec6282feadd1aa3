use humiture_drivers::ReadError;

/// All bridge errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The `MQTT` client rejected a request.
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::v5::ClientError),
    /// Every read of an acquisition cycle failed.
    #[error("Sensor error: {0}")]
    Sensor(#[from] ReadError),
    /// The blocking acquisition task panicked or was aborted.
    #[error("Acquisition task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// The `GPIO` pin could not be acquired.
    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] humiture_drivers::rpi::Error),
}

/// A specialized [`Result`] type for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
