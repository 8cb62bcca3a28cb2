use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct SharedBufferWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for SharedBufferWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut guard = self.buf.lock().expect("buffer lock poisoned");
        guard.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct SharedMakeWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedMakeWriter {
    type Writer = SharedBufferWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedBufferWriter {
            buf: Arc::clone(&self.buf),
        }
    }
}

/// Run `f` with a log subscriber installed and return its result plus
/// everything logged at `level` and above.
pub fn capture_logs_at<R>(level: tracing::Level, f: impl FnOnce() -> R) -> (R, String) {
    let log_buf = Arc::new(Mutex::new(Vec::new()));
    let make_writer = SharedMakeWriter {
        buf: Arc::clone(&log_buf),
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(make_writer)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);

    let logs = String::from_utf8(log_buf.lock().expect("buffer lock poisoned").clone())
        .expect("logs should be valid UTF-8");
    (result, logs)
}

pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    capture_logs_at(tracing::Level::DEBUG, f)
}
