// ABOUTME: Prometheus metrics for the chat service
// ABOUTME: Thin wrappers over the metrics facade so handlers record with one call

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder. Call once per process.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;
    describe();
    Ok(handle)
}

/// A handle that renders without installing a global recorder (tests, embedding)
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

fn describe() {
    metrics::describe_counter!("chat_requests_total", "Chat API requests by route and outcome");
    metrics::describe_counter!("chat_messages_sent_total", "Messages stored, by kind");
    metrics::describe_counter!(
        "chat_conversations_created_total",
        "Conversations created on first contact"
    );
    metrics::describe_counter!("chat_errors_total", "Chat API errors by kind");
}

pub fn record_request(route: &'static str, outcome: &'static str) {
    metrics::counter!("chat_requests_total", "route" => route, "outcome" => outcome).increment(1);
}

pub fn record_message_sent(kind: &str) {
    metrics::counter!("chat_messages_sent_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_conversation_created() {
    metrics::counter!("chat_conversations_created_total").increment(1);
}

pub fn record_error(kind: &'static str) {
    metrics::counter!("chat_errors_total", "kind" => kind).increment(1);
}
