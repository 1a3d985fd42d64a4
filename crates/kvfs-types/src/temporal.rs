use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the UNIX epoch.
///
/// Record timestamps carry `time_t` resolution.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        assert!(now_secs() > 1_577_836_800);
    }
}
