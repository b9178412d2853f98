//! Human-readable byte and duration formatting for progress output.

pub const KB: u64 = 1024;
pub const MB: u64 = 1048576;
pub const GB: u64 = 1073741824;
pub const TB: u64 = 1099511627776;

/// Formats a byte count with a binary-magnitude suffix, e.g. `1.50GB`.
pub fn size_pretty(size: u64) -> String {
    if size >= TB {
        format!("{:.2}TB", size as f64 / TB as f64)
    } else if size >= GB {
        format!("{:.2}GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2}MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2}KB", size as f64 / KB as f64)
    } else {
        format!("{}B", size)
    }
}

/// Formats a duration in seconds as a short unit string, e.g. `2h 3m 10s`.
/// Zero components are omitted.
pub fn duration_short(total_secs: u64) -> String {
    if total_secs == 0 {
        return "0s".to_string();
    }

    let days = total_secs / 86400;
    let hours = (total_secs % 86400) / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if mins > 0 {
        parts.push(format!("{}m", mins));
    }
    if secs > 0 {
        parts.push(format!("{}s", secs));
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_plain_bytes() {
        assert_eq!(size_pretty(0), "0B");
        assert_eq!(size_pretty(512), "512B")
    }

    #[test]
    fn formats_each_magnitude() {
        assert_eq!(size_pretty(1536), "1.50KB");
        assert_eq!(size_pretty(100 * MB), "100.00MB");
        assert_eq!(size_pretty(GB + GB / 2), "1.50GB");
        assert_eq!(size_pretty(2 * TB), "2.00TB")
    }

    #[test]
    fn formats_a_zero_duration() {
        assert_eq!(duration_short(0), "0s")
    }

    #[test]
    fn formats_seconds_only() {
        assert_eq!(duration_short(42), "42s")
    }

    #[test]
    fn formats_mixed_components_and_skips_zero_ones() {
        assert_eq!(duration_short(90), "1m 30s");
        assert_eq!(duration_short(3600), "1h");
        assert_eq!(duration_short(86400 + 3 * 3600 + 10), "1d 3h 10s")
    }
}
