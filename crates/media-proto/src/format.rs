//! Human-readable rendering of sizes, durations and timestamps.

use chrono::NaiveDateTime;

const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// 1536 -> "1.5 KB".  Two decimals at most, trailing zeros dropped.
pub fn file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(value, 2), SIZE_UNITS[unit])
}

/// 42 -> "42s", 125 -> "2:05", 3725 -> "1:02:05".
pub fn duration(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    if total < 60 {
        return format!("{}s", total);
    }
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h == 0 {
        format!("{}:{:02}", m, s)
    } else {
        format!("{}:{:02}:{:02}", h, m, s)
    }
}

pub fn bitrate(bps: u64) -> String {
    match bps {
        0..=999 => format!("{} bps", bps),
        1_000..=999_999 => format!("{:.0} kbps", bps as f64 / 1_000.0),
        _ => format!("{:.1} Mbps", bps as f64 / 1_000_000.0),
    }
}

pub fn uptime(seconds: u64) -> String {
    match seconds {
        0..=59 => format!("{}s", seconds),
        60..=3599 => format!("{}m {}s", seconds / 60, seconds % 60),
        3600..=86_399 => format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60),
        _ => format!("{}d {}h", seconds / 86_400, (seconds % 86_400) / 3600),
    }
}

/// Server timestamps look like "2024-03-01 10:00:00"; anything else is shown
/// verbatim.
pub fn created(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S"))
        .map(|dt| dt.format("%b %-d, %Y %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn trim_decimals(value: f64, places: usize) -> String {
    let s = format!("{:.*}", places, value);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
