//! Prometheus metrics exposition
//!
//! The library crates emit through the `metrics` facade:
//!
//! - `client_pool_acquire_total` (counter): label `outcome`
//! - `client_pool_acquire_wait_seconds` (histogram)
//! - `client_pool_connections_created_total` (counter)
//! - `client_pool_in_use` (gauge)
//! - `rate_limit_rejections_total` (counter): label `operation`
//! - `transaction_validations_total` (counter): label `outcome`

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const ACQUIRE_WAIT_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0,
];

/// Builder with histogram buckets for the acquire wait, so it renders as a
/// Prometheus histogram rather than a summary.
fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("client_pool_acquire_wait_seconds".to_string()),
            ACQUIRE_WAIT_BUCKETS,
        )
        .context("failed to set histogram buckets")
}

/// Install the Prometheus recorder globally and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;
    use runtime::{Runtime, RuntimeConfig};

    /// Isolated recorder/handle pair; only one global recorder may exist per
    /// process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    fn test_config(dir: &std::path::Path) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.vault.kdf_iterations = 1_000;
        config.wallet_storage.path = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn runtime_activity_renders_expected_series() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(&test_config(dir.path())).await.unwrap();
        drop(runtime.acquire_client("query").await.unwrap());
        runtime.validate_transaction("send", 5_000_000).unwrap();
        let _ = runtime.validate_transaction("send", 50_000_000);

        let output = handle.render();
        assert!(output.contains("client_pool_acquire_total"));
        assert!(output.contains("outcome=\"created\""));
        assert!(
            output.contains("client_pool_acquire_wait_seconds_bucket"),
            "acquire wait must render _bucket lines"
        );
        assert!(output.contains("transaction_validations_total"));
        assert!(output.contains("outcome=\"confirmation_required\""));
        assert!(output.contains("outcome=\"rejected\""));
    }

    #[test]
    fn empty_recorder_renders_without_panicking() {
        let (_recorder, handle) = isolated_recorder();
        let _ = handle.render();
    }
}
