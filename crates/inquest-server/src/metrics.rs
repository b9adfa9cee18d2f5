//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
#[must_use]
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants; the recording crates sit below this one in the
// dependency graph, so the names double as the catalog for `/metrics`.

/// Investigations finished (counter, labels: outcome).
pub const INVESTIGATIONS_TOTAL: &str = "investigations_total";
/// Investigations currently running (gauge).
pub const ACTIVE_INVESTIGATIONS: &str = "active_investigations";
/// Wire frames emitted (counter, labels: event).
pub const INVESTIGATION_EVENTS_TOTAL: &str = "investigation_events_total";
/// Tool dispatches (counter, labels: status).
pub const TOOL_DISPATCHES_TOTAL: &str = "tool_dispatches_total";
/// History compactions (counter).
pub const COMPACTIONS_TOTAL: &str = "compactions_total";
/// Provider retries (counter, labels: category).
pub const PROVIDER_RETRIES_TOTAL: &str = "provider_retries_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();

        let output = handle.render();
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            INVESTIGATIONS_TOTAL,
            ACTIVE_INVESTIGATIONS,
            INVESTIGATION_EVENTS_TOTAL,
            TOOL_DISPATCHES_TOTAL,
            COMPACTIONS_TOTAL,
            PROVIDER_RETRIES_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
