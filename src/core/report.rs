//! YM-011: Command execution reports and timestamp rendering.

use std::time::Duration;

/// Width used when the terminal size is unknown.
const DEFAULT_COLUMNS: usize = 80;

/// Outcome of one executed command, retries included.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandReport {
    pub command: String,
    /// Attempts beyond the first
    pub retries: u32,
    /// Wall time summed over all attempts
    pub elapsed: Duration,
    pub success: bool,
}

impl CommandReport {
    pub fn indicator(&self) -> &'static str {
        if !self.success {
            "🔴"
        } else if self.retries > 0 {
            "🟠"
        } else {
            "🟢"
        }
    }

    /// One report line padded to `cols` columns.
    pub fn render(&self, cols: usize) -> String {
        let timing = format_elapsed(self.elapsed);
        let used = self.command.chars().count() + timing.chars().count() + 7;
        let padding = " ".repeat(cols.saturating_sub(used));
        format!("{} `{}` {} {}", self.indicator(), self.command, padding, timing)
    }
}

/// Full timing report: a header line and one line per command.
pub fn render_reports(reports: &[CommandReport], cols: usize) -> String {
    let title = " Yam Report ";
    let side = cols.saturating_sub(title.len()) / 2;
    let mut out = format!("{}{}{}\n", "=".repeat(side), title, "=".repeat(side));
    for report in reports {
        out.push_str(&report.render(cols));
        out.push('\n');
    }
    out
}

pub fn print_reports(reports: &[CommandReport]) {
    let cols = std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.parse().ok())
        .unwrap_or(DEFAULT_COLUMNS);
    print!("{}", render_reports(reports, cols));
}

/// Short elapsed time: `850µs`, `12.30ms`, `1.50s`, `2m 5.00s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs >= 60.0 {
        format!("{}m {:.2}s", elapsed.as_secs() / 60, secs % 60.0)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else if elapsed.as_micros() >= 1000 {
        format!("{:.2}ms", secs * 1000.0)
    } else {
        format!("{}µs", elapsed.as_micros())
    }
}

/// UTC rendering of a timestamp in seconds, `end of time` for infinity.
///
/// Format: `YYYY-MM-DD HH:MM:SS[.ffffff]+00:00`, microseconds only when
/// non-zero.
pub fn human_readable_timestamp(timestamp: f64) -> String {
    if timestamp.is_infinite() {
        return "end of time".to_string();
    }
    let total_micros = (timestamp * 1_000_000.0).round() as i64;
    let secs = total_micros.div_euclid(1_000_000);
    let micros = total_micros.rem_euclid(1_000_000);
    let days = secs.div_euclid(86_400);
    let time_secs = secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);

    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year,
        month,
        day,
        time_secs / 3600,
        (time_secs % 3600) / 60,
        time_secs % 60
    );
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out.push_str("+00:00");
    out
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
