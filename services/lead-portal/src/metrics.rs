//! Prometheus metrics exposition
//!
//! - `portal_oauth_callbacks_total` (counter): label `outcome`
//! - `portal_leads_created_total` (counter): label `outcome`
//! - `portal_upstream_duration_seconds` (histogram): label `call`

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const UPSTREAM_DURATION: &str = "portal_upstream_duration_seconds";

/// 5ms to 30s; the upper bound covers the longest configurable upstream wait.
const UPSTREAM_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(UPSTREAM_DURATION.to_string()), UPSTREAM_BUCKETS)
        .context("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Outcome of one `/oauth/callback` request.
pub fn record_callback(outcome: &'static str) {
    metrics::counter!("portal_oauth_callbacks_total", "outcome" => outcome).increment(1);
}

/// Outcome of one `/api/lead` request.
pub fn record_lead(outcome: &'static str) {
    metrics::counter!("portal_leads_created_total", "outcome" => outcome).increment(1);
}

/// Wall time of one outbound call (`token_exchange`, `create_lead`, `user_info`).
pub fn record_upstream(call: &'static str, duration_secs: f64) {
    metrics::histogram!(UPSTREAM_DURATION, "call" => call).record(duration_secs);
}

/// Recorder that is not installed globally, for tests.
#[cfg(test)]
pub fn test_recorder() -> metrics_exporter_prometheus::PrometheusRecorder {
    builder()
        .expect("failed to set histogram buckets")
        .build_recorder()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_callback("success");
        record_lead("created");
        record_upstream("token_exchange", 0.1);
    }

    #[test]
    fn counters_carry_outcome_label() {
        let recorder = test_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_callback("success");
        record_callback("state_mismatch");
        record_lead("validation_failed");

        let output = handle.render();
        assert!(output.contains("portal_oauth_callbacks_total"));
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("outcome=\"state_mismatch\""));
        assert!(output.contains("portal_leads_created_total"));
        assert!(output.contains("outcome=\"validation_failed\""));
    }

    #[test]
    fn upstream_duration_renders_as_histogram() {
        let recorder = test_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_upstream("create_lead", 0.003);

        let output = handle.render();
        assert!(
            output.contains("portal_upstream_duration_seconds_bucket"),
            "histogram must render _bucket lines"
        );
        assert!(output.contains("call=\"create_lead\""));
        assert!(output.contains("le=\"0.005\""));
        assert!(output.contains("le=\"30\""));
        assert!(output.contains("le=\"+Inf\""));
    }
}
