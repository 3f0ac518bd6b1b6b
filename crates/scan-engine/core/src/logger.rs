use std::{fs::OpenOptions, path::Path};

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{FormatFields, format::Writer},
    layer::{Context, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    config::Config,
    error::EngineError,
    models::{LogEntry, Logger},
};

const LOG_FILE_NAME: &str = "scan-engine.log";
const DEFAULT_LOG_FILTER: &str = "debug,rustls=warn,bitreq=info";

/// Forwards INFO and above events to the application's [`Logger`].
pub(crate) struct AppLoggerLayer {
    pub(crate) log_listener: Option<Box<dyn Logger>>,
}

impl<S> Layer<S> for AppLoggerLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().level() > &Level::INFO {
            return;
        }
        let Some(listener) = self.log_listener.as_ref() else {
            return;
        };

        let mut buf = String::new();
        if tracing_subscriber::fmt::format::DefaultFields::new()
            .format_fields(Writer::new(&mut buf), event)
            .is_ok()
        {
            listener.log(LogEntry {
                line: buf,
                level: event.metadata().level().to_string(),
            });
        }
    }
}

fn filter_directives(config: &Config) -> &str {
    config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
}

/// Installs the global subscriber: a file log in `log_dir` and, when given,
/// the application's logger. Events are filtered by `config.log_filter`.
pub fn init_logging(
    config: &Config,
    log_dir: &Path,
    app_logger: Option<Box<dyn Logger>>,
) -> Result<(), EngineError> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE_NAME))?;

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter_directives(config)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_line_number(true)
                .with_writer(log_file),
        )
        .with(AppLoggerLayer {
            log_listener: app_logger,
        })
        .try_init()
        .map_err(|e| EngineError::Generic(e.to_string()))
}
