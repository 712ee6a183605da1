pub mod log_sink;
pub mod webhook_sink;

pub use log_sink::LogDigestSink;
pub use webhook_sink::WebhookDigestSink;
