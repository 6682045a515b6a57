use std::io::ErrorKind;
use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tracing::level_filters::LevelFilter;
use tracing::trace;

use crate::error::{CollectError, CollectResult};

const LOG_LEVEL: &str = "HEALTHMON_LOG";

const DEFAULT_LEVEL: LevelFilter = LevelFilter::INFO;

pub fn get_log_level() -> LevelFilter {
    let level_from_env = std::env::var(LOG_LEVEL);
    level_from_env.map_or(DEFAULT_LEVEL, |res| res.parse().unwrap_or(DEFAULT_LEVEL))
}

/// Runs an external diagnostic tool with an explicit timeout.
///
/// The child is killed when the timeout fires. A non-zero exit is *not* an
/// error here; callers that care inspect [`Output::status`] themselves,
/// since several of the tools (smartctl in particular) report useful data
/// alongside a non-zero status.
pub async fn run_command(program: &str, args: &[&str], timeout: Duration) -> CollectResult<Output> {
    trace!("running {program} {args:?}");

    let result = tokio::time::timeout(
        timeout,
        Command::new(program).args(args).kill_on_drop(true).output(),
    )
    .await;

    match result {
        Err(_) => Err(CollectError::Timeout {
            command: program.to_string(),
            timeout,
        }),
        Ok(Err(e)) if e.kind() == ErrorKind::NotFound => Err(CollectError::missing_tool(program)),
        Ok(Err(e)) if e.kind() == ErrorKind::PermissionDenied => {
            Err(CollectError::PermissionDenied(program.to_string()))
        }
        Ok(Err(e)) => Err(CollectError::Io(e)),
        Ok(Ok(output)) => Ok(output),
    }
}

/// Like [`run_command`], but additionally treats a non-zero exit as failure.
pub async fn run_checked(program: &str, args: &[&str], timeout: Duration) -> CollectResult<String> {
    let output = run_command(program, args, timeout).await?;
    if !output.status.success() {
        return Err(CollectError::UnexpectedExit {
            command: program.to_string(),
            code: output.status.code(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Truncates a log message to at most `max` characters, on a char boundary.
pub fn truncate_message(message: &str, max: usize) -> String {
    message.chars().take(max).collect()
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1024f64.powi(3))
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1024f64.powi(2))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
