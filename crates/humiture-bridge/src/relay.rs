use std::num::NonZeroUsize;
use std::time::Duration;

use humiture_drivers::{MAX_ATTEMPTS, Reading, Sensor, read_with_retry};

use tokio_util::sync::CancellationToken;

use tracing::{error, info};

use crate::error::{Error, Result};
use crate::publisher::{Channel, Publish};

/// When acquisition cycles run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Wait before each cycle.
    pub period: Duration,
    /// Stop after this many successful publications, if set.
    pub max_publications: Option<NonZeroUsize>,
}

/// Formats a reading value for publication, with one decimal digit.
#[must_use]
pub fn format_value(value: f64) -> String {
    format!("{value:.1}")
}

/// Publishes the temperature and then the humidity of `reading`.
///
/// # Errors
///
/// Fails as soon as one value is rejected by the publisher.
pub async fn publish_reading<P: Publish>(publisher: &P, reading: &Reading) -> Result<()> {
    publisher
        .publish(Channel::Temperature, format_value(reading.temperature()))
        .await?;
    publisher
        .publish(Channel::Humidity, format_value(reading.humidity()))
        .await
}

// Reads on the blocking pool: the reads busy-wait and sleep between
// retries. The sensor is handed back to the caller afterwards.
async fn acquire<S>(mut sensor: S) -> Result<(S, Result<Reading>)>
where
    S: Sensor + Send + 'static,
{
    let (sensor, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = read_with_retry(&mut sensor, MAX_ATTEMPTS);
        (sensor, outcome)
    })
    .await?;

    Ok((sensor, outcome.map_err(Error::from)))
}

/// Runs acquisition cycles until `cancellation_token` is cancelled or the
/// schedule publication budget is reached.
///
/// Cancellation is observed while waiting for the next cycle and while
/// publishing. An acquisition in progress always completes.
///
/// Each cycle waits for the schedule period, reads `sensor` with bounded
/// retries and publishes the reading. A cycle whose reads all fail, or
/// whose publication is rejected, is logged and skipped.
///
/// Returns the number of successful publications.
///
/// # Errors
///
/// Fails only if the blocking acquisition task panics.
pub async fn run<S, P>(
    mut sensor: S,
    publisher: &P,
    schedule: Schedule,
    cancellation_token: CancellationToken,
) -> Result<usize>
where
    S: Sensor + Send + 'static,
    P: Publish,
{
    let mut publications = 0;

    loop {
        tokio::select! {
            () = cancellation_token.cancelled() => { break; }
            () = tokio::time::sleep(schedule.period) => {}
        }

        let (returned, outcome) = acquire(sensor).await?;
        sensor = returned;

        match outcome {
            Ok(reading) => {
                info!("{reading}");
                let published = tokio::select! {
                    () = cancellation_token.cancelled() => { break; }
                    published = publish_reading(publisher, &reading) => published,
                };
                match published {
                    Ok(()) => publications += 1,
                    Err(e) => error!("Skipping the reading, publication failed: {e}"),
                }
            }
            Err(e) => error!("Skipping the cycle, every read failed: {e}"),
        }

        if schedule
            .max_publications
            .is_some_and(|max| publications >= max.get())
        {
            info!("Published {publications} readings, stopping");
            break;
        }
    }

    Ok(publications)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::num::NonZeroUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use humiture_drivers::decoder::RawFrame;
    use humiture_drivers::validator::validate;
    use humiture_drivers::{ErrorKind, ReadError, Reading, Sensor};

    use tokio_util::sync::CancellationToken;

    use crate::error::{Error, Result};
    use crate::publisher::{Channel, Publish};

    use super::{Schedule, format_value, publish_reading, run};

    const VALID: [u8; 5] = [0x02, 0x8C, 0x01, 0x0A, 0x99];
    const CORRUPTED: [u8; 5] = [0x02, 0x8C, 0x01, 0x0A, 0x00];

    fn outcome(bytes: [u8; 5]) -> std::result::Result<Reading, ReadError> {
        validate(&RawFrame::new(bytes), true)
    }

    struct ScriptedSensor {
        outcomes: VecDeque<std::result::Result<Reading, ReadError>>,
    }

    impl ScriptedSensor {
        fn new(outcomes: impl IntoIterator<Item = [u8; 5]>) -> Self {
            Self {
                outcomes: outcomes.into_iter().map(outcome).collect(),
            }
        }
    }

    impl Sensor for ScriptedSensor {
        fn read(&mut self, _check_checksum: bool) -> std::result::Result<Reading, ReadError> {
            self.outcomes.pop_front().unwrap_or_else(|| outcome(VALID))
        }

        fn pause(&mut self, _duration: Duration) {}
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(Channel, String)>>,
        reject: bool,
    }

    impl RecordingPublisher {
        fn published(&self) -> Vec<(Channel, String)> {
            self.published.lock().unwrap().clone()
        }
    }

    impl Publish for RecordingPublisher {
        async fn publish(&self, channel: Channel, value: String) -> Result<()> {
            if self.reject {
                return Err(Error::Sensor(outcome(CORRUPTED).unwrap_err()));
            }
            self.published.lock().unwrap().push((channel, value));
            Ok(())
        }
    }

    fn schedule(max_publications: usize) -> Schedule {
        Schedule {
            period: Duration::from_millis(1),
            max_publications: NonZeroUsize::new(max_publications),
        }
    }

    #[test]
    fn values_have_one_decimal() {
        assert_eq!(format_value(33.0), "33.0");
        assert_eq!(format_value(65.2), "65.2");
        assert_eq!(format_value(-12.5), "-12.5");
    }

    #[tokio::test]
    async fn temperature_is_published_first() {
        let publisher = RecordingPublisher::default();
        let reading = outcome(VALID).unwrap();

        publish_reading(&publisher, &reading).await.unwrap();

        assert_eq!(
            publisher.published(),
            vec![
                (Channel::Temperature, "26.6".to_string()),
                (Channel::Humidity, "65.2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn stops_after_the_publication_budget() {
        let publisher = RecordingPublisher::default();
        let sensor = ScriptedSensor::new([VALID, VALID, VALID]);

        let publications = run(sensor, &publisher, schedule(2), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(publications, 2);
        assert_eq!(publisher.published().len(), 4);
    }

    #[tokio::test]
    async fn failed_cycle_is_skipped() {
        let publisher = RecordingPublisher::default();
        // A whole retry budget of corrupted frames, then a valid one.
        let sensor = ScriptedSensor::new([CORRUPTED; 10]);

        let publications = run(sensor, &publisher, schedule(1), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(publications, 1);
        assert_eq!(
            publisher.published(),
            vec![
                (Channel::Temperature, "26.6".to_string()),
                (Channel::Humidity, "65.2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn rejected_publications_are_not_counted() {
        let publisher = RecordingPublisher {
            reject: true,
            ..RecordingPublisher::default()
        };
        let sensor = ScriptedSensor::new([VALID, VALID]);
        let cancellation_token = CancellationToken::new();

        let canceller = cancellation_token.clone();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let publications = run(sensor, &publisher, schedule(1), cancellation_token)
            .await
            .unwrap();
        stopper.await.unwrap();

        assert_eq!(publications, 0);
        assert!(publisher.published().is_empty());
    }

    struct StalledPublisher;

    impl Publish for StalledPublisher {
        async fn publish(&self, _channel: Channel, _value: String) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_stalled_publication() {
        let sensor = ScriptedSensor::new([VALID]);
        let cancellation_token = CancellationToken::new();

        let canceller = cancellation_token.clone();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let publications = tokio::time::timeout(
            Duration::from_secs(5),
            run(sensor, &StalledPublisher, schedule(1), cancellation_token),
        )
        .await
        .expect("run must end once cancelled")
        .unwrap();
        stopper.await.unwrap();

        assert_eq!(publications, 0);
    }

    #[tokio::test]
    async fn cancelled_before_the_first_cycle() {
        let publisher = RecordingPublisher::default();
        let sensor = ScriptedSensor::new([VALID]);
        let cancellation_token = CancellationToken::new();
        cancellation_token.cancel();

        let schedule = Schedule {
            period: Duration::from_secs(3600),
            max_publications: None,
        };

        let publications = run(sensor, &publisher, schedule, cancellation_token)
            .await
            .unwrap();

        assert_eq!(publications, 0);
        assert!(publisher.published().is_empty());
    }

    #[test]
    fn sensor_errors_keep_their_kind() {
        let Error::Sensor(error) = Error::from(outcome(CORRUPTED).unwrap_err()) else {
            panic!("expected a sensor error");
        };

        assert_eq!(error.kind(), ErrorKind::ChecksumMismatch);
    }
}
