use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Lines kept for slow `/logs` subscribers before they start lagging.
pub const LOG_CHANNEL_CAPACITY: usize = 500;

/// Mirrors every formatted log line to a broadcast channel (served as SSE)
/// and, unless suppressed, to stderr.
#[derive(Clone)]
pub struct BroadcastMakeWriter {
    pub sender: broadcast::Sender<String>,
    pub suppress_stderr: bool,
}

impl<'a> MakeWriter<'a> for BroadcastMakeWriter {
    type Writer = BroadcastWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BroadcastWriter {
            sender: self.sender.clone(),
            suppress_stderr: self.suppress_stderr,
        }
    }
}

pub struct BroadcastWriter {
    sender: broadcast::Sender<String>,
    suppress_stderr: bool,
}

impl std::io::Write for BroadcastWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(msg); // Ignored if no receivers
        if !self.suppress_stderr {
            std::io::stderr().write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.suppress_stderr {
            std::io::stderr().flush()?;
        }
        Ok(())
    }
}

/// Install the global subscriber and return the sender feeding `/logs`.
pub fn init(level: Level, suppress_stderr: bool) -> broadcast::Sender<String> {
    let (log_tx, _) = broadcast::channel::<String>(LOG_CHANNEL_CAPACITY);
    let make_writer = BroadcastMakeWriter {
        sender: log_tx.clone(),
        suppress_stderr,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(make_writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // Already set in tests
    log_tx
}
