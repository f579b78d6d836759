//! Subscriber setup for the honeypot binaries
//!
//! Two layers:
//! - the console (stdout) layer shows diagnostics filtered by
//!   `RUST_LOG`, plus every honeypot event unless `quiet` is set;
//! - the event layer writes only [`EVENT_TARGET`] events, always, to
//!   the configured event log or standard error.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::sink::EVENT_TARGET;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

/// Install the global subscriber for `config`.
///
/// # Errors
///
/// Returns an error if the event log cannot be opened, `RUST_LOG` is
/// malformed, or a global subscriber is already set.
pub fn init(config: &ServerConfig) -> Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "info".to_string());
    let events = match &config.event_log {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::Config(format!("Cannot open {}: {e}", path.display())))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let subscriber = subscriber(&directives, config.quiet, std::io::stdout, events)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Config(e.to_string()))
}

/// Build the two-layer subscriber writing to `console` and `events`.
///
/// # Errors
///
/// Returns an error if `directives` is not a valid filter.
pub fn subscriber<C, E>(
    directives: &str,
    quiet: bool,
    console: C,
    events: E,
) -> Result<impl Subscriber + Send + Sync + use<C, E>>
where
    C: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let mut console_filter = EnvFilter::try_new(directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{directives}': {e}")))?;
    if quiet {
        let silence = format!("{EVENT_TARGET}=off")
            .parse()
            .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))?;
        console_filter = console_filter.add_directive(silence);
    }
    let event_filter = Targets::new().with_target(EVENT_TARGET, LevelFilter::INFO);

    Ok(tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(console)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(events)
                .with_ansi(false)
                .with_target(false)
                .with_filter(event_filter),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{EventSink, TracingSink};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Emit one event and one diagnostic, return (console, event log).
    fn emit(quiet: bool) -> (String, String) {
        let console = Captured::default();
        let events = Captured::default();
        let (c, e) = (console.clone(), events.clone());
        let subscriber = subscriber("info", quiet, move || c.clone(), move || e.clone()).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            TracingSink.record("IP: 10.0.0.9, LOGIN: root toor");
            tracing::info!("imap honeypot listening");
        });
        (console.text(), events.text())
    }

    #[test]
    fn events_reach_console_and_event_log() {
        let (console, events) = emit(false);
        assert!(console.contains("IP: 10.0.0.9, LOGIN: root toor"));
        assert!(console.contains("listening"));
        assert!(events.contains("IP: 10.0.0.9, LOGIN: root toor"));
        assert!(!events.contains("listening"));
    }

    #[test]
    fn quiet_keeps_events_off_the_console_only() {
        let (console, events) = emit(true);
        assert!(!console.contains("LOGIN"));
        assert!(console.contains("listening"));
        assert!(events.contains("IP: 10.0.0.9, LOGIN: root toor"));
    }

    #[test]
    fn bad_filter_is_config_error() {
        let result = subscriber("mailhoney=loud", false, std::io::sink, std::io::sink);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
