//! Harvest Log File
//!
//! Tracing output tees to stderr and to a per-day file
//! `data/logs/harvest_YYYYMMDD.log`. The rotation key is the UTC date at
//! process start; long-lived daemons reopen on their own schedule, the CLI
//! does not.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// A shared append-only log file usable as a tracing writer.
#[derive(Clone)]
pub struct SharedLogFile(Arc<Mutex<File>>);

impl Write for SharedLogFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock() {
            Ok(mut file) => file.write(buf),
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.0.lock() {
            Ok(mut file) => file.flush(),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLogFile {
    type Writer = SharedLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Open today's harvest log under `data_dir/logs`.
fn open_log_file(data_dir: &Path) -> Option<SharedLogFile> {
    let logs_dir = data_dir.join("logs");
    if let Err(e) = std::fs::create_dir_all(&logs_dir) {
        eprintln!("cannot create log directory {}: {e}", logs_dir.display());
        return None;
    }

    let name = format!("harvest_{}.log", chrono::Utc::now().format("%Y%m%d"));
    match OpenOptions::new().create(true).append(true).open(logs_dir.join(&name)) {
        Ok(file) => Some(SharedLogFile(Arc::new(Mutex::new(file)))),
        Err(e) => {
            eprintln!("cannot open log file {name}: {e}");
            None
        }
    }
}

/// Initialize tracing: env-filtered, human format, teed to the daily log.
pub fn init_logging(data_dir: &Path) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vio83_core=info"));

    match open_log_file(data_dir) {
        Some(log_file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr.and(log_file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
