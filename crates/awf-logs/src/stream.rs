//! Streaming access-log lines from a source to a formatter

use crate::discovery::LogSource;
use crate::error::{LogError, Result};
use crate::parser::{parse_line, AccessLogRecord};
use crate::render::RecordFormatter;
use awf_docker::ContainerManager;
use awf_types::ACCESS_LOG_CONTAINER_PATH;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// How the streamer should behave.
#[derive(Debug, Clone, Copy)]
pub struct StreamOptions {
    /// Tail the source continuously instead of reading it once.
    pub follow: bool,
    /// Parse lines into records, falling back to raw on failure.
    pub parse: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            follow: false,
            parse: true,
        }
    }
}

pub struct LogStreamer {
    containers: ContainerManager,
}

impl LogStreamer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            containers: ContainerManager::new()?,
        })
    }

    /// Stream the source's lines through the formatter to stdout.
    pub async fn stream(
        &self,
        source: &LogSource,
        formatter: &dyn RecordFormatter,
        options: StreamOptions,
    ) -> Result<()> {
        match (source, options.follow) {
            (LogSource::Running { container }, false) => {
                let exec = self
                    .containers
                    .exec_command(container, vec!["cat", ACCESS_LOG_CONTAINER_PATH])
                    .await?;
                for line in exec.output.lines() {
                    emit(formatter, line, options.parse);
                }
                Ok(())
            }
            (LogSource::Running { container }, true) => {
                let mut cmd = Command::new("docker");
                cmd.args([
                    "exec",
                    container.as_str(),
                    "tail",
                    "-F",
                    "-n",
                    "+1",
                    ACCESS_LOG_CONTAINER_PATH,
                ]);
                self.follow_child(cmd, formatter, options.parse).await
            }
            (LogSource::Preserved { .. }, false) => {
                let path = source.access_log_path().expect("preserved source");
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|_| LogError::MissingAccessLog(path.clone()))?;
                for line in content.lines() {
                    emit(formatter, line, options.parse);
                }
                Ok(())
            }
            (LogSource::Preserved { .. }, true) => {
                let path = source.access_log_path().expect("preserved source");
                if !path.is_file() {
                    return Err(LogError::MissingAccessLog(path));
                }
                let mut cmd = Command::new("tail");
                cmd.arg("-F").arg("-n").arg("+1").arg(&path);
                self.follow_child(cmd, formatter, options.parse).await
            }
        }
    }

    /// Read all parseable records from the source; unparseable lines are
    /// skipped with a debug log.
    pub async fn read_records(&self, source: &LogSource) -> Result<Vec<AccessLogRecord>> {
        let content = match source {
            LogSource::Running { container } => {
                self.containers
                    .exec_command(container, vec!["cat", ACCESS_LOG_CONTAINER_PATH])
                    .await?
                    .output
            }
            LogSource::Preserved { .. } => {
                let path = source.access_log_path().expect("preserved source");
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|_| LogError::MissingAccessLog(path.clone()))?
            }
        };

        let mut records = Vec::new();
        for line in content.lines() {
            match parse_line(line) {
                Some(record) => records.push(record),
                None if line.trim().is_empty() => {}
                None => debug!(line, "skipping unparseable access-log line"),
            }
        }
        Ok(records)
    }

    /// Tail a child process's stdout through the formatter until it exits or
    /// the user interrupts; on interrupt the child is terminated politely
    /// and the remaining buffered output is drained.
    async fn follow_child(
        &self,
        mut cmd: Command,
        formatter: &dyn RecordFormatter,
        parse: bool,
    ) -> Result<()> {
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::null());
        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().expect("stdout piped above");
        let mut lines = BufReader::new(stdout).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => emit(formatter, &line, parse),
                        None => break,
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(error = %e, "failed to listen for interrupt");
                    }
                    debug!("interrupt received, stopping tail");
                    child.start_kill().ok();
                    // Drain whatever the child produced before dying.
                    while let Ok(Some(line)) = lines.next_line().await {
                        emit(formatter, &line, parse);
                    }
                    break;
                }
            }
        }

        child.wait().await.ok();
        Ok(())
    }
}

/// Parse-then-format with raw fallback; parse failures are logged at debug
/// and never fatal.
fn emit(formatter: &dyn RecordFormatter, line: &str, parse: bool) {
    if line.trim().is_empty() {
        return;
    }
    if parse {
        if let Some(record) = parse_line(line) {
            println!("{}", formatter.format_record(&record));
            return;
        }
        debug!(line, "unparseable access-log line, passing through raw");
    }
    println!("{}", formatter.format_raw(line));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::LogSource;
    use crate::render::RawFormatter;
    use std::fs;

    #[tokio::test]
    async fn test_read_records_from_preserved_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("access.log"),
            concat!(
                "1761074374.646 172.30.0.20:39748 api.github.com:443 140.82.114.22:443 1.1 CONNECT 200 TCP_TUNNEL:HIER_DIRECT api.github.com:443 \"-\"\n",
                "not a log line\n",
                "\n",
                "1760994429.358 172.30.0.20:36274 github.com:8443 -:- 1.1 CONNECT 403 TCP_DENIED:HIER_NONE github.com:8443 \"curl/7.81.0\"\n",
            ),
        )
        .unwrap();

        // Preserved sources never touch the Docker daemon; the client is
        // constructed lazily so this works without one.
        let streamer = LogStreamer::new().unwrap();
        let source = LogSource::preserved(tmp.path().to_path_buf());
        let records = streamer.read_records(&source).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].domain, "api.github.com");
        assert_eq!(records[1].domain, "github.com");
    }

    #[tokio::test]
    async fn test_missing_preserved_file_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let streamer = LogStreamer::new().unwrap();
        let source = LogSource::preserved(tmp.path().join("nope"));
        let err = streamer
            .stream(&source, &RawFormatter, StreamOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::MissingAccessLog(_)));
    }
}
