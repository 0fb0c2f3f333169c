//! Durable access log: one JSON object per line, rotated daily and gzipped.
//!
//! Writes go through a bounded channel drained by a blocking task, so the
//! request path never waits on disk. A full channel or a failed write loses
//! the line.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, NaiveDate, SecondsFormat};
use flate2::{Compression, write::GzEncoder};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{config::FileLogConfig, error::AnalyticsError, models::Exchange};

const CHANNEL_CAPACITY: usize = 10_000;

#[derive(Debug, Serialize)]
pub struct FileLine<'a> {
    pub date: String,
    pub method: &'a str,
    pub endpoint: &'a str,
    #[serde(rename = "remote-address")]
    pub remote_address: &'a str,
    pub status: u16,
    #[serde(rename = "total-time")]
    pub total_time: f64,
    #[serde(rename = "user-agent")]
    pub user_agent: &'a str,
    #[serde(rename = "content-length")]
    pub content_length: String,
}

impl<'a> FileLine<'a> {
    pub fn from_exchange(exchange: &'a Exchange) -> Self {
        Self {
            date: exchange.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            method: &exchange.method,
            endpoint: &exchange.endpoint,
            remote_address: exchange.remote_addr.as_deref().unwrap_or("-"),
            status: exchange.status,
            total_time: (exchange.elapsed_ms * 1000.0).round() / 1000.0,
            user_agent: exchange.user_agent.as_deref().unwrap_or("-"),
            content_length: exchange
                .content_length
                .map_or_else(|| "-".into(), |len| len.to_string()),
        }
    }

    pub fn render(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

/// Append-only file that rolls over when the local date changes.
pub struct RotatingFile {
    path: PathBuf,
    writer: BufWriter<File>,
    current_date: NaiveDate,
}

impl RotatingFile {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::open_on(path, Local::now().date_naive())
    }

    /// A non-empty file left by an earlier run keeps the date it was last
    /// written on, so it is archived under that day.
    pub fn open_on(path: impl Into<PathBuf>, today: NaiveDate) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let current_date = last_written_on(&path).unwrap_or(today);
        let writer = BufWriter::new(open_append(&path)?);
        Ok(Self {
            path,
            writer,
            current_date,
        })
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_line_on(line, Local::now().date_naive())
    }

    pub fn write_line_on(&mut self, line: &str, today: NaiveDate) -> io::Result<()> {
        if today != self.current_date {
            self.rotate(today)?;
        }
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    /// Moves the live file aside, reopens it, then compresses the moved copy.
    /// The date advances whatever happens, so a failure is not retried on
    /// every later line.
    fn rotate(&mut self, today: NaiveDate) -> io::Result<()> {
        let previous = std::mem::replace(&mut self.current_date, today);
        self.writer.flush()?;

        let staged = dated_path(&self.path, previous);
        if let Err(e) = fs::rename(&self.path, &staged) {
            warn!(error = %e, path = %self.path.display(), "Could not move access log aside");
            return Ok(());
        }
        self.writer = BufWriter::new(open_append(&self.path)?);

        let archive = archive_path(&self.path, previous);
        match compress_into(&staged, &archive).and_then(|()| fs::remove_file(&staged)) {
            Ok(()) => info!(archive = %archive.display(), "Rotated access log"),
            Err(e) => warn!(
                error = %e,
                staged = %staged.display(),
                "Failed to compress rotated access log"
            ),
        }
        Ok(())
    }
}

fn last_written_on(path: &Path) -> Option<NaiveDate> {
    let meta = fs::metadata(path).ok().filter(|m| m.len() > 0)?;
    let modified = meta.modified().ok()?;
    Some(DateTime::<Local>::from(modified).date_naive())
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn dated_path(path: &Path, date: NaiveDate) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}", date.format("%Y-%m-%d")))
}

pub fn archive_path(path: &Path, date: NaiveDate) -> PathBuf {
    let mut archive = dated_path(path, date).into_os_string();
    archive.push(".gz");
    PathBuf::from(archive)
}

fn compress_into(source: &Path, archive: &Path) -> io::Result<()> {
    let mut input = File::open(source)?;
    let output = OpenOptions::new().create(true).append(true).open(archive)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.sync_all()
}

/// Producer side of the access log.
#[derive(Debug, Clone)]
pub struct FileSink {
    sender: mpsc::Sender<String>,
}

impl FileSink {
    /// Opens the log file and starts the writer. Needs a tokio runtime.
    pub fn spawn(config: &FileLogConfig) -> Result<(Self, JoinHandle<()>), AnalyticsError> {
        let path = config.path();
        let file = RotatingFile::open(&path).map_err(|source| AnalyticsError::AccessLog {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Access log opened");
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::task::spawn_blocking(move || drain(file, receiver));
        Ok((Self { sender }, handle))
    }

    pub fn send(&self, line: String) {
        if let Err(e) = self.sender.try_send(line) {
            debug!(error = %e, "Dropped access log line");
        }
    }
}

fn drain(mut file: RotatingFile, mut receiver: mpsc::Receiver<String>) {
    while let Some(line) = receiver.blocking_recv() {
        if let Err(e) = file.write_line(&line) {
            warn!(error = %e, path = %file.path.display(), "Failed to write access log line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::SystemTime;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn exchange() -> Exchange {
        Exchange {
            at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap(),
            method: "POST".into(),
            path: "/api/users".into(),
            endpoint: "/api/users?page=2".into(),
            status: 201,
            elapsed_ms: 12.345_678,
            content_length: None,
            user_agent: Some("curl/8.0 extra".into()),
            remote_addr: Some("10.0.0.1".into()),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn line_uses_access_log_field_names() {
        let ex = exchange();
        let line = FileLine::from_exchange(&ex).render().unwrap();
        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["date"], "2025-03-01T08:30:00.000Z");
        assert_eq!(json["endpoint"], "/api/users?page=2");
        assert_eq!(json["remote-address"], "10.0.0.1");
        assert_eq!(json["status"], 201);
        assert_eq!(json["total-time"], 12.346);
        assert_eq!(json["user-agent"], "curl/8.0 extra");
        assert_eq!(json["content-length"], "-");
        assert!(!line.ends_with(','));
    }

    #[test]
    fn writes_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/access.json");
        let mut file = RotatingFile::open_on(&path, day(1)).unwrap();
        file.write_line_on("{\"a\":1}", day(1)).unwrap();
        file.write_line_on("{\"a\":2}", day(1)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn date_change_archives_previous_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.json");
        let mut file = RotatingFile::open_on(&path, day(1)).unwrap();
        file.write_line_on("first", day(1)).unwrap();
        file.write_line_on("second", day(2)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
        let archive = archive_path(&path, day(1));
        assert_eq!(
            archive.file_name().unwrap().to_string_lossy(),
            "access.json.2025-03-01.gz"
        );
        let mut decoded = String::new();
        GzDecoder::new(File::open(&archive).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "first\n");
        assert!(!dated_path(&path, day(1)).exists());
    }

    #[test]
    fn failed_compression_keeps_the_day_and_stops_retrying() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.json");
        fs::create_dir(archive_path(&path, day(1))).unwrap();

        let mut file = RotatingFile::open_on(&path, day(1)).unwrap();
        file.write_line_on("first", day(1)).unwrap();
        file.write_line_on("second", day(2)).unwrap();
        file.write_line_on("third", day(2)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\nthird\n");
        assert_eq!(
            fs::read_to_string(dated_path(&path, day(1))).unwrap(),
            "first\n"
        );
    }

    #[test]
    fn leftover_file_is_archived_under_its_own_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.json");
        fs::write(&path, "old\n").unwrap();
        let noon = Local
            .from_local_datetime(&day(1).and_hms_opt(12, 0, 0).unwrap())
            .unwrap();
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::from(noon))
            .unwrap();

        let mut file = RotatingFile::open_on(&path, day(3)).unwrap();
        file.write_line_on("new", day(3)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        let mut decoded = String::new();
        GzDecoder::new(File::open(archive_path(&path, day(1))).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "old\n");
        assert!(!archive_path(&path, day(3)).exists());
    }

    #[tokio::test]
    async fn sink_delivers_lines_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileLogConfig {
            dir: dir.path().to_path_buf(),
            file_name: "access.json".into(),
        };
        let (sink, handle) = FileSink::spawn(&config).unwrap();
        sink.send("hello".into());
        drop(sink);
        handle.await.unwrap();
        assert_eq!(fs::read_to_string(config.path()).unwrap(), "hello\n");
    }
}
