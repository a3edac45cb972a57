// Process-wide file logging, configured once by the outer boundary (and by
// each indexing child for its own log file).
//
// Log lines render as `[LEVEL] [file:line] target: message`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();
static GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        write!(
            writer,
            "[{}] [{}:{}] {}: ",
            metadata.level(),
            metadata.file().unwrap_or("?"),
            metadata.line().unwrap_or(0),
            metadata.target(),
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Initialize file logging and the panic forwarder. Safe to call more than
/// once; only the first call in a process takes effect.
pub fn init(log_file: &Path) {
    let file = match std::fs::File::create(log_file) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot create log file '{}': {}", log_file.display(), e);
            return;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(LineFormat)
        .with_writer(writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = GUARD.set(guard);
        let _ = LOG_FILE.set(log_file.to_path_buf());
        forward_panics();
    }
}

/// The log file the process writes to, once configured. Indexing children
/// derive their per-child log names from it.
pub fn log_file() -> Option<&'static Path> {
    LOG_FILE.get().map(PathBuf::as_path)
}

/// Uncaught panics anywhere in the process end up in the log instead of
/// being silently lost with the worker that hit them.
fn forward_panics() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("Uncaught panic: {}", info);
        previous(info);
    }));
}
