//! The `humiture` daemon: reads a `DHT22` sensor wired to a Raspberry Pi
//! and republishes its values to an `MQTT` broker.

use std::process::ExitCode;

use clap::Parser;

use humiture_drivers::SensorReader;
use humiture_drivers::rpi::RpiPin;
use humiture_drivers::timer::MonotonicTimer;

use humiture_bridge::config::Cli;
use humiture_bridge::error::Result;
use humiture_bridge::publisher::MqttPublisher;
use humiture_bridge::relay;

use tokio_util::sync::CancellationToken;

use tracing::{error, info};

async fn serve(cli: Cli) -> Result<usize> {
    let pin = RpiPin::new(cli.pin)?;
    info!("Sensor data line on BCM pin {}", cli.pin);
    let sensor = SensorReader::new(pin, MonotonicTimer);

    let publisher = MqttPublisher::connect(&cli.broker_config());

    let cancellation_token = CancellationToken::new();
    let shutdown = cancellation_token.clone();
    let _signal = tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for the shutdown signal: {e}");
            return;
        }
        info!("Shutdown requested, finishing the current cycle");
        shutdown.cancel();
    });

    let outcome = relay::run(sensor, &publisher, cli.schedule(), cancellation_token).await;
    publisher.disconnect().await;
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .init();

    match serve(cli).await {
        Ok(publications) => {
            info!("Published {publications} readings");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
