//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Call once at
/// startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants.

/// Sessions opened total (counter).
pub const SESSIONS_OPENED_TOTAL: &str = "sessions_opened_total";
/// Sessions closed total (counter).
pub const SESSIONS_CLOSED_TOTAL: &str = "sessions_closed_total";
/// Session opens rejected because the name was taken (counter).
pub const SESSIONS_REJECTED_TOTAL: &str = "sessions_rejected_total";
/// Live sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Commands applied (counter, labels: command).
pub const COMMANDS_TOTAL: &str = "commands_total";
/// Commands ignored (counter, labels: reason).
pub const COMMANDS_IGNORED_TOTAL: &str = "commands_ignored_total";
/// Commands that failed (counter, labels: command, error_type).
pub const COMMAND_ERRORS_TOTAL: &str = "command_errors_total";
/// Content deliveries dropped on full sinks (counter).
pub const DELIVERIES_DROPPED_TOTAL: &str = "deliveries_dropped_total";
/// Signals coalesced into a pending one (counter).
pub const SIGNALS_COALESCED_TOTAL: &str = "signals_coalesced_total";
/// `notify` messages that could not be enqueued (counter, labels: reason).
pub const NOTIFY_MISSES_TOTAL: &str = "notify_misses_total";
/// Session lifetime (histogram, seconds).
pub const SESSION_DURATION_SECONDS: &str = "session_duration_seconds";
/// Messages written to session transports (counter).
pub const MESSAGES_SENT_TOTAL: &str = "messages_sent_total";
/// Inbound frames that failed to decode (counter).
pub const FRAMES_REJECTED_TOTAL: &str = "frames_rejected_total";
/// REST requests total (counter, labels: endpoint, status).
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            SESSIONS_OPENED_TOTAL,
            SESSIONS_CLOSED_TOTAL,
            SESSIONS_REJECTED_TOTAL,
            SESSIONS_ACTIVE,
            COMMANDS_TOTAL,
            COMMANDS_IGNORED_TOTAL,
            COMMAND_ERRORS_TOTAL,
            DELIVERIES_DROPPED_TOTAL,
            SIGNALS_COALESCED_TOTAL,
            NOTIFY_MISSES_TOTAL,
            SESSION_DURATION_SECONDS,
            MESSAGES_SENT_TOTAL,
            FRAMES_REJECTED_TOTAL,
            HTTP_REQUESTS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
