use web_time::{SystemTime, UNIX_EPOCH};

/// Returns early with `Err($err)` when `$cond` does not hold.
#[macro_export]
macro_rules! ensure_input {
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
}

/// Current unix time in seconds, saturating to 0 on a clock set before 1970.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Shortens a server supplied message for display.
pub(crate) fn sanitize_reason(reason: &str, max_chars: usize) -> String {
    reason.replace('<', "").trim().chars().take(max_chars).collect()
}
