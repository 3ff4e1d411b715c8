//! 日志系统: 控制台彩色输出 + 按日期切分的文件输出.
//!
//! 解码核心通过 `log` 门面输出, 经 tracing-subscriber 桥接后与应用自身的
//! tracing 事件走同一套过滤与格式化.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration as ChronoDuration, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
    pub file_prefix: String,
    /// 历史日志保留天数, 初始化时清理更早的文件
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_retention_days() -> i64 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_prefix: "eac3".to_string(),
            retention_days: default_retention_days(),
        }
    }
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 初始化全局日志订阅器, 进程内只能成功一次
pub fn init(config: LoggingConfig) -> Result<()> {
    let directory = Path::new(&config.directory);
    fs::create_dir_all(directory)
        .with_context(|| format!("创建日志目录失败, path={}", directory.display()))?;

    let today = Local::now().date_naive();
    let removed = cleanup_expired_logs(directory, &config.file_prefix, config.retention_days, today)?;

    let file_appender = DailyFileWriter::new(directory, &config.file_prefix)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    let console_filter = EnvFilter::new("debug");
    let file_filter = EnvFilter::new(&config.level);

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(console_filter);

    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("全局日志订阅器已初始化")?;

    if removed > 0 {
        tracing::info!("清理过期日志 {} 个, 保留 {} 天", removed, config.retention_days);
    }
    Ok(())
}

/// 写入当天日志文件, 跨日后的首次写入切换到新文件
struct DailyFileWriter {
    directory: PathBuf,
    prefix: String,
    date: NaiveDate,
    file: File,
}

impl DailyFileWriter {
    fn new(directory: &Path, prefix: &str) -> Result<Self> {
        let today = Local::now().date_naive();
        let file = open_append_file(&build_current_log_path(directory, prefix, today))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            date: today,
            file,
        })
    }

    fn reopen_if_needed(&mut self) -> std::io::Result<()> {
        let today = Local::now().date_naive();
        if today == self.date {
            return Ok(());
        }
        let file_path = build_current_log_path(&self.directory, &self.prefix, today);
        self.file = open_append_file(&file_path).map_err(std::io::Error::other)?;
        self.date = today;
        Ok(())
    }
}

impl Write for DailyFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.reopen_if_needed()?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

/// 从 `<prefix>.<YYYY-MM-DD>.log` 中解析日期
fn parse_log_file_date(file_name: &str, prefix: &str) -> Option<NaiveDate> {
    let date_part = file_name
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(".log")?;
    if date_part.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// 删除早于 `today - retention_days` 的日志文件, 返回删除个数
pub fn cleanup_expired_logs(
    directory: &Path,
    prefix: &str,
    retention_days: i64,
    today: NaiveDate,
) -> Result<usize> {
    if !directory.exists() {
        return Ok(0);
    }
    let cutoff = today - ChronoDuration::days(retention_days);

    let mut removed = 0;
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some(date) = parse_log_file_date(&file_name, prefix) else {
            continue;
        };
        if date < cutoff {
            fs::remove_file(entry.path())
                .with_context(|| format!("删除过期日志失败, file={file_name}"))?;
            removed += 1;
        }
    }
    Ok(removed)
}

struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis()
        )?;
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(
            writer,
            "{}{:5}\x1b[0m {} > ",
            color,
            meta.level().to_string(),
            meta.target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        write!(
            writer,
            "[{}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {:5} {} > ",
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            event.metadata().level().to_string(),
            event.metadata().target()
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        match NaiveDate::from_ymd_opt(y, m, d) {
            Some(date) => date,
            None => panic!("测试日期初始化失败"),
        }
    }

    #[test]
    fn test_build_current_log_path() {
        let path = build_current_log_path(Path::new("logs"), "eac3", date(2026, 2, 6));
        assert_eq!(path, PathBuf::from("logs/eac3.2026-02-06.log"));
    }

    #[test]
    fn test_parse_log_file_date() {
        assert_eq!(
            parse_log_file_date("eac3.2026-02-06.log", "eac3"),
            Some(date(2026, 2, 6))
        );
        assert_eq!(parse_log_file_date("eac3.log", "eac3"), None);
        assert_eq!(parse_log_file_date("other.2026-02-06.log", "eac3"), None);
        assert_eq!(parse_log_file_date("eac3.2026-2-6.log", "eac3"), None);
    }

    #[test]
    fn test_cleanup_expired_logs() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let today = date(2026, 3, 10);
        for name in [
            "eac3.2026-03-10.log",
            "eac3.2026-03-03.log",
            "eac3.2026-03-02.log",
            "eac3.2026-01-01.log",
            "notes.txt",
        ] {
            fs::write(dir.join(name), b"x").unwrap();
        }

        let removed = cleanup_expired_logs(dir, "eac3", 7, today).unwrap();
        assert_eq!(removed, 2);
        assert!(dir.join("eac3.2026-03-10.log").exists());
        assert!(dir.join("eac3.2026-03-03.log").exists());
        assert!(!dir.join("eac3.2026-03-02.log").exists());
        assert!(!dir.join("eac3.2026-01-01.log").exists());
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn test_cleanup_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert_eq!(cleanup_expired_logs(&missing, "eac3", 7, date(2026, 1, 1)).unwrap(), 0);
    }

    #[test]
    fn test_daily_writer_appends_to_today_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = DailyFileWriter::new(temp_dir.path(), "eac3").unwrap();
        writer.write_all(b"line 1\n").unwrap();
        writer.write_all(b"line 2\n").unwrap();
        writer.flush().unwrap();

        let path = build_current_log_path(temp_dir.path(), "eac3", writer.date);
        assert_eq!(fs::read_to_string(path).unwrap(), "line 1\nline 2\n");
    }
}
