use std::io::{self, IsTerminal as _};

use anyhow::Context as _;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, fmt, fmt::MakeWriter, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::AnyResult;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "PSUFAN_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber, logging either to stderr or to the
/// systemd journal.
///
/// # Errors
pub fn init(journald: bool) -> AnyResult<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    if journald {
        let journald = tracing_journald::layer().context("connecting to the systemd journal")?;
        registry.with(journald).try_init()?;
    } else {
        let stderr = fmt_layer(io::stderr, io::stderr().is_terminal());
        registry.with(stderr).try_init()?;
    }

    Ok(())
}

/// Plain text layer, colored only when `ansi` is set.
fn fmt_layer<S, W>(writer: W, ansi: bool) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fmt::layer()
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(writer)
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::layer::SubscriberExt;

    use super::fmt_layer;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured(ansi: bool) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber =
            tracing_subscriber::registry().with(fmt_layer(move || writer.clone(), ansi));

        tracing::subscriber::with_default(subscriber, || tracing::warn!("failed to get temperature"));

        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_plain_output_has_no_escapes() {
        let output = captured(false);

        assert!(output.contains("WARN"));
        assert!(output.contains("failed to get temperature"));
        assert!(!output.contains('\x1b'));
    }

    #[test]
    fn test_terminal_output_is_colored() {
        assert!(captured(true).contains('\x1b'));
    }
}
