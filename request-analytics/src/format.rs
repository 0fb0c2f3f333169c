use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use crossterm::style::{StyledContent, Stylize};
use num_format::{Locale, ToFormattedString};
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::debug;

use crate::models::LogEntry;

const BAR_CELLS: usize = 12;
const BAR_FULL_MS: f64 = 1000.0;
const FAST_MS: f64 = 100.0;
const MEDIUM_MS: f64 = 300.0;
const RATE_HINT_THRESHOLD: u64 = 10;
pub const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / 1024.0 / 1024.0)
    }
}

fn method_style(method: &str) -> StyledContent<String> {
    let label = method.to_owned();
    match method {
        "GET" => label.cyan(),
        "POST" => label.green(),
        "PUT" => label.blue(),
        "DELETE" => label.red(),
        "PATCH" => label.yellow(),
        _ => label.white(),
    }
}

fn status_icon(status: u16) -> StyledContent<char> {
    match status {
        0..300 => '●'.green(),
        300..400 => '○'.blue(),
        400..500 => '◐'.yellow(),
        _ => '◑'.red(),
    }
}

fn progress_bar(ms: f64) -> String {
    let filled = ((ms / BAR_FULL_MS).clamp(0.0, 1.0) * BAR_CELLS as f64).round() as usize;
    format!(
        "{}{}",
        "━".repeat(filled).cyan(),
        "╌".repeat(BAR_CELLS - filled).grey()
    )
}

fn response_time(ms: f64) -> String {
    let timing = format!("{ms}ms");
    let timing = if ms < FAST_MS {
        timing.green()
    } else if ms < MEDIUM_MS {
        timing.yellow()
    } else {
        timing.red()
    };
    format!("{} {timing}", progress_bar(ms))
}

/// Renders the console line for one buffered entry.
pub fn console_line(entry: &LogEntry) -> String {
    let url = if entry.status >= 400 {
        entry.url.as_str().red()
    } else {
        entry.url.as_str().white()
    };
    let mut line = format!(
        "{} {:<2}{} {} │ {} │ {} {}",
        entry.timestamp.as_str().grey(),
        entry.category.icon(),
        status_icon(entry.status),
        method_style(&entry.method),
        url,
        response_time(entry.response_time),
        entry.size.as_str().grey(),
    );

    if entry.status >= 400 {
        let memory = format!("[Memory: {}]", entry.memory);
        let agent = format!("[UA: {}]", entry.user_agent.as_deref().unwrap_or("-"));
        line.push_str(&format!(
            "\n  {} {} {}",
            '↳'.red(),
            memory.grey(),
            agent.grey()
        ));
    }

    if let Some(rate) = entry.requests_per_minute.filter(|r| *r > RATE_HINT_THRESHOLD) {
        let hint = format!("↳ {}/min", rate.to_formatted_string(&Locale::en));
        line.push_str(&format!("\n  {}", hint.yellow()));
    }
    line
}

/// Where console lines go. A failed write drops the line.
pub struct Console {
    out: Mutex<Box<dyn Write + Send>>,
}

impl Console {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn print(&self, line: &str) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            debug!(error = %e, "Dropped console line");
        }
    }
}

struct Sample {
    system: System,
    taken: Option<(Instant, String)>,
}

/// Samples resident and virtual memory of this process, at most once per
/// interval.
pub struct MemorySampler {
    pid: Option<Pid>,
    interval: Duration,
    sample: Mutex<Sample>,
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::with_interval(MEMORY_SAMPLE_INTERVAL)
    }
}

impl MemorySampler {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            pid: sysinfo::get_current_pid().ok(),
            interval,
            sample: Mutex::new(Sample {
                system: System::new(),
                taken: None,
            }),
        }
    }

    pub fn snapshot(&self) -> String {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> String {
        let mut sample = self.sample.lock();
        if let Some((taken_at, text)) = &sample.taken
            && now.saturating_duration_since(*taken_at) < self.interval
        {
            return text.clone();
        }
        let text = self.read(&mut sample.system);
        sample.taken = Some((now, text.clone()));
        text
    }

    fn read(&self, system: &mut System) -> String {
        let Some(pid) = self.pid else {
            return "-".into();
        };
        if !system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory()) {
            return "-".into();
        }
        system.process(pid).map_or_else(
            || "-".into(),
            |process| {
                format!(
                    "RSS: {} Virt: {}",
                    format_size(process.memory()),
                    format_size(process.virtual_memory())
                )
            },
        )
    }
}
