use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_graded_submission(resubmission: bool) {
    let kind = if resubmission { "resubmission" } else { "first" };
    metrics::counter!("submissions_graded_total", "kind" => kind).increment(1);
}

pub(crate) fn record_blob_failures(op: &'static str, count: usize) {
    if count > 0 {
        metrics::counter!("blob_operations_failed_total", "op" => op).increment(count as u64);
    }
}
