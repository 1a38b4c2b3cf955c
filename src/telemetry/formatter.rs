//! Log formatting helpers, ported from the teacher's `core::logging::formatter`.

use chrono::{DateTime, Utc};
use colored::*;

/// Format a hash for display (truncated with ellipsis).
pub fn format_hash(hash: &[u8], length: usize) -> ColoredString {
    let hex_str = hex::encode(hash);
    let truncated = if hex_str.len() > length {
        format!("{}...", &hex_str[..length])
    } else {
        hex_str
    };
    truncated.bright_cyan()
}

/// Format the current time for log lines.
pub fn format_timestamp() -> ColoredString {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S").to_string().bright_white()
}

/// Format a duration in milliseconds, human-readable.
pub fn format_duration_ms(ms: u64) -> ColoredString {
    if ms < 1000 {
        format!("{}ms", ms).bright_yellow()
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0).bright_yellow()
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) as f64 / 1000.0;
        format!("{}m{:.1}s", minutes, seconds).bright_yellow()
    }
}

/// Format an evidence-strength tier with a tier-appropriate color.
pub fn format_strength(strength: &str) -> ColoredString {
    match strength {
        "maximum" => strength.to_string().bright_green(),
        "enhanced" => strength.to_string().green(),
        "standard" => strength.to_string().yellow(),
        "basic" => strength.to_string().bright_yellow(),
        _ => strength.to_string().bright_red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_hash_truncates_long_hashes() {
        let hash = [0xABu8; 32];
        let formatted = format_hash(&hash, 8);
        assert!(format!("{}", formatted).contains("..."));
    }

    #[test]
    fn format_duration_switches_units() {
        assert!(format!("{}", format_duration_ms(500)).ends_with("ms"));
        assert!(format!("{}", format_duration_ms(1_500)).ends_with('s'));
    }
}
