use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,libp2p_swarm=warn,libp2p_mdns=warn";

/// Initialize tracing with a console layer and a daily log file under `log_dir`.
///
/// The returned guard must stay alive for file logs to be written.
pub fn init_logging(log_dir: &Path, log_file_prefix: &str) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_prefix);
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_appender)
        .with_ansi(false);

    // stdout belongs to the chat itself
    let console_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}
