//! Invocation-level flows
//!
//! Each flow opens its own [`Session`], runs one engine against it and closes
//! the session again on every exit path.

use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::metrics;
use crate::modbus::Session;
use crate::query::{QueryEngine, ReadingSet};
use crate::sink::{InfluxSink, Point};
use crate::write::{WriteEngine, WriteResult};

/// Result of one poll: whatever was read, plus the failure if the cycle
/// stopped early.
#[derive(Debug)]
pub struct PollOutcome {
    pub readings: ReadingSet,
    pub error: Option<anyhow::Error>,
}

impl PollOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Connect, poll every field once, disconnect.
pub async fn poll_once(config: &Config, engine: &QueryEngine) -> PollOutcome {
    let mut session = match Session::open(&config.device).await {
        Ok(session) => session,
        Err(e) => {
            return PollOutcome {
                readings: ReadingSet::new(),
                error: Some(anyhow::Error::new(e).context("Issues querying eBox")),
            }
        }
    };

    let result = engine.run(&mut session).await;
    session.close().await;

    match result {
        Ok(readings) => PollOutcome {
            readings,
            error: None,
        },
        Err(e) => {
            let readings = e.partial.clone();
            PollOutcome {
                readings,
                error: Some(anyhow::Error::new(e).context("Issues querying eBox")),
            }
        }
    }
}

/// Poll `repetitions` times, starting a cycle every `interval`.
///
/// A failed cycle is logged and whatever it read is still pushed to the sink.
/// Sink failures are logged and never stop the loop.
pub async fn poll_repeatedly(config: &Config, repetitions: u32, interval: Duration) -> Result<()> {
    if config.metrics.enabled {
        metrics::init_metrics(&config.metrics)?;
    }

    let engine = QueryEngine::new(config.address_table());
    let mut sink = config.sink.enabled.then(|| InfluxSink::new(&config.sink));

    for cycle in 1..=repetitions {
        let start = Instant::now();
        info!("Starting query #{}", cycle);

        let outcome = poll_once(config, &engine).await;
        if let Some(e) = &outcome.error {
            error!("{:#}", e);
        }

        for reading in &outcome.readings {
            info!("{} : {} Type: {}", reading.name, reading.value, reading.type_tag);
        }

        let point = Point::from_readings(
            &config.sink.measurement,
            &config.device.host,
            chrono::Utc::now(),
            &outcome.readings,
        );

        if point.is_empty() {
            warn!("No readings to store for query #{}", cycle);
        } else if let Some(sink) = sink.as_mut() {
            match sink.write(&point).await {
                Ok(()) => {
                    metrics::record_sink_write(true);
                    info!("Added {} fields to InfluxDB", point.fields.len());
                }
                Err(e) => {
                    metrics::record_sink_write(false);
                    warn!("Problem inserting into InfluxDB: {}", e);
                }
            }
        }

        if cycle < repetitions {
            if let Some(wait) = interval.checked_sub(start.elapsed()) {
                tokio::time::sleep(wait).await;
            }
        }
    }

    Ok(())
}

/// Connect, write the three phase limits, disconnect.
pub async fn write_setpoint(config: &Config, phases: [f32; 3]) -> Result<WriteResult> {
    let mut session = Session::open(&config.device)
        .await
        .with_context(|| "Issues writing to eBox")?;

    let [phase1, phase2, phase3] = phases;
    let result = WriteEngine::new()
        .run(&mut session, phase1, phase2, phase3)
        .await;
    session.close().await;

    let result = result.with_context(|| "Issues writing to eBox")?;
    info!("Write result: {:?}", result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    fn unreachable_config() -> Config {
        Config {
            device: DeviceConfig {
                host: "127.0.0.1".to_string(),
                port: 1,
                unit_id: 1,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_poll_once_reports_connect_failure() {
        let config = unreachable_config();
        let engine = QueryEngine::new(config.address_table());

        let outcome = poll_once(&config, &engine).await;

        assert!(!outcome.is_complete());
        assert!(outcome.readings.is_empty());
    }

    #[tokio::test]
    async fn test_write_setpoint_reports_connect_failure() {
        let config = unreachable_config();
        assert!(write_setpoint(&config, [16.0, 16.0, 16.0]).await.is_err());
    }
}
