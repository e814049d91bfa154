//! Remote path and name utilities

use crate::utils::config::FilterDefaults;

/// Join a remote directory and a child name with exactly one `/`.
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Lower-cased substring after the last `.`; empty if the name has no dot.
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(i) => name[i + 1..].to_lowercase(),
        None => String::new(),
    }
}

/// Hidden files start with a dot.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Editor backups, temp files and Office lock files.
pub fn is_temporary_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    FilterDefaults::TEMP_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
        || lower.starts_with(FilterDefaults::TEMP_PREFIX)
}

/// True if `full_path` names `name` (ends with `/name`, or equals it).
pub fn path_ends_with_name(full_path: &str, name: &str) -> bool {
    full_path == name
        || full_path
            .strip_suffix(name)
            .is_some_and(|head| head.ends_with('/'))
}

/// Truncate to at most `max` characters, ending in `...` when cut. Char-boundary safe.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Milliseconds since epoch for "now". Clock before epoch reads as 0.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}
