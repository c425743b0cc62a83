//! Subscriber setup for the `srsw` binary.

use anyhow::Result;
use srsw_execution::{SpecialistEvent, SpecialistEventLayer};
use srsw_infrastructure::paths::SrsPaths;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "srsw.log";

/// Handles that must outlive the command.
#[derive(Default)]
pub struct Logging {
    /// Held until exit so the file writer flushes.
    pub file_guard: Option<WorkerGuard>,
    /// Specialist loop events, when streaming was requested.
    pub events: Option<UnboundedReceiver<SpecialistEvent>>,
}

/// Installs the global subscriber.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`). With `to_file`
/// they are also written as JSON to a daily-rolling file in the user log
/// directory. With `stream_events` the specialist loop's events are captured
/// by a [`SpecialistEventLayer`] and handed back as a channel.
///
/// # Errors
///
/// Fails when the log directory cannot be created or a subscriber is
/// already installed.
pub fn init(to_file: bool, stream_events: bool) -> Result<Logging> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let mut logging = Logging::default();

    let file_layer = if to_file {
        let logs_dir = SrsPaths::logs_dir()?;
        std::fs::create_dir_all(&logs_dir)?;
        let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        logging.file_guard = Some(guard);
        Some(tracing_subscriber::fmt::layer().json().with_writer(writer))
    } else {
        None
    };

    let event_layer = if stream_events {
        let (layer, receiver) = SpecialistEventLayer::channel();
        logging.events = Some(receiver);
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .with(event_layer)
        .try_init()?;
    Ok(logging)
}

/// Prints every received event to stderr as one JSON line.
pub fn spawn_event_printer(
    mut events: UnboundedReceiver<SpecialistEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("{}", render_event(&event));
        }
    })
}

fn render_event(event: &SpecialistEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| format!("{} {}", event.level, event.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::HashMap;

    #[test]
    fn test_render_event_is_one_json_line() {
        let event = SpecialistEvent {
            target: "srsw_execution::specialist_loop".to_string(),
            level: "INFO".to_string(),
            message: "[SpecialistLoop] Iteration 1".to_string(),
            fields: HashMap::from([("iteration".to_string(), json!(1))]),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        };

        let line = render_event(&event);
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["fields"]["iteration"], 1);
    }
}
