//! Logging setup and console formatting helpers

use std::fmt;
use std::time::{Duration, SystemTime};
use tracing::Level;
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

/// Custom time formatter that shows only seconds
struct SecondPrecisionTimer;

impl FormatTime for SecondPrecisionTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let since_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        // time of day, UTC
        let secs = since_epoch.as_secs() % 86_400;
        write!(w, "{}", format_wall_time(Duration::from_secs(secs)))
    }
}

/// Initialize stdout logging. Verbose runs report at INFO level, otherwise
/// only warnings and errors are shown.
pub fn setup_output(verbose: bool) {
    let level = if verbose { Level::INFO } else { Level::WARN };
    // a subscriber may already be installed, e.g. by another test
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_timer(SecondPrecisionTimer)
        .with_target(false)
        .with_writer(std::io::stdout)
        .try_init();
}

/// Format a duration as `HH:MM:SS`, truncating fractional seconds.
pub fn format_wall_time(elapsed: Duration) -> String {
    let total_seconds = elapsed.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds / 60) % 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
