//! Parses the progress lines a copy worker writes to its status stream.
//!
//! GNU `dd` reacts to `SIGUSR1` by printing a line like:
//!
//! ```text
//! 1048576 bytes (1.0 MB, 1.0 MiB) copied, 2.5 s, 419 kB/s
//! ```
//!
//! Only the total byte count and the transfer rate are of interest here; the
//! rate is converted from `dd`'s human-readable unit to raw bytes per second.

use once_cell::sync::Lazy;
use regex::Regex;

static PROGRESS_REG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+) bytes.*, (\d+(?:\.\d+)?) (\w+)/s").unwrap());

/// A successfully parsed progress line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Total bytes copied by the worker so far.
    pub bytes_copied: u64,
    /// Instantaneous transfer rate in bytes per second.
    pub rate: u64,
}

/// Parses one status line into a [`Progress`].
///
/// Returns `None` for anything that does not look like a progress line,
/// including rates carrying an unrecognized unit suffix.
pub fn parse_progress_line(line: &str) -> Option<Progress> {
    let caps = PROGRESS_REG.captures(line)?;
    let bytes_copied = caps[1].parse::<u64>().ok()?;
    let value = caps[2].parse::<f64>().ok()?;
    let rate = rate_to_bytes(value, &caps[3])?;

    Some(Progress { bytes_copied, rate })
}

/// Converts a rate value with a `dd` unit suffix to bytes per second.
/// `dd` uses SI suffixes (`kB` = 1000) alongside IEC ones (`KiB` = 1024).
fn rate_to_bytes(value: f64, unit: &str) -> Option<u64> {
    let multiplier: f64 = match unit {
        "B" | "bytes" => 1.0,
        "kB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((value * multiplier) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_full_dd_status_line() {
        let progress =
            parse_progress_line("1048576 bytes (1.0 MB, 1.0 MiB) copied, 2.5 s, 419 kB/s");

        assert_eq!(
            progress,
            Some(Progress { bytes_copied: 1048576, rate: 419_000 })
        )
    }

    #[test]
    fn parses_a_fractional_si_rate() {
        let progress =
            parse_progress_line("734003200 bytes (734 MB, 700 MiB) copied, 5.2 s, 1.4 GB/s");

        assert_eq!(
            progress,
            Some(Progress { bytes_copied: 734003200, rate: 1_400_000_000 })
        )
    }

    #[test]
    fn parses_an_iec_rate() {
        let progress = parse_progress_line("2048 bytes copied, 2.0 s, 1.0 KiB/s");

        assert_eq!(progress, Some(Progress { bytes_copied: 2048, rate: 1024 }))
    }

    #[test]
    fn parses_a_plain_bytes_rate() {
        let progress = parse_progress_line("10 bytes copied, 10.0 s, 1 B/s");

        assert_eq!(progress, Some(Progress { bytes_copied: 10, rate: 1 }))
    }

    #[test]
    fn rejects_an_unknown_rate_unit() {
        assert_eq!(parse_progress_line("10 bytes copied, 1 s, 1 XB/s"), None)
    }

    #[test]
    fn rejects_a_records_line() {
        // dd's SIGUSR1 dump is three lines; the first two carry record counts.
        assert_eq!(parse_progress_line("2048+0 records in"), None);
        assert_eq!(parse_progress_line("2048+0 records out"), None)
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_progress_line("dd: error writing '/dev/xvdf'"), None);
        assert_eq!(parse_progress_line(""), None)
    }
}
