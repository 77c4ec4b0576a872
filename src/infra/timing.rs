// ============================================================
// Layer 6 - Duration Formatting
// ============================================================
// Epoch timings and ETAs are reported as H:MM:SS.

use std::time::Duration;

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Time left for `remaining` epochs at the pace of `per_epoch`
pub fn estimate_remaining(per_epoch: Duration, remaining: usize) -> Duration {
    per_epoch * remaining as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_duration(Duration::from_secs(61)), "0:01:01");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 25 * 60 + 9)), "3:25:09");
        assert_eq!(format_duration(Duration::from_millis(1999)), "0:00:01");
    }

    #[test]
    fn test_estimate_remaining() {
        let eta = estimate_remaining(Duration::from_secs(90), 4);
        assert_eq!(format_duration(eta), "0:06:00");
    }
}
