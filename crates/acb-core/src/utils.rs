use chrono::{DateTime, SecondsFormat, Utc};

// ============== Timestamp Helpers ==============

/// ISO-8601 timestamp in UTC with millisecond precision (`2024-05-01T08:30:00.125Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar date (UTC) used to name the daily log file.
pub fn log_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

// ============== Text Helpers ==============

/// First `max_chars` characters of `s` (never splits a code point).
pub fn preview(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Strip the decorations people paste around a channel username:
/// `@name`, `https://t.me/name`, `t.me/name/`.
pub fn normalize_username(raw: &str) -> &str {
    let mut s = raw.trim();
    for prefix in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
        }
    }
    for prefix in ["t.me/", "telegram.me/"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
        }
    }
    s = s.trim_start_matches('@');
    s.trim_end_matches('/')
}

/// Make an account identifier safe to embed in a file name.
///
/// ASCII alphanumerics, `+`, `-` and `_` pass through; every other byte is
/// written as `%XX`, so distinct inputs always give distinct names.
pub fn file_safe_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'_') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
