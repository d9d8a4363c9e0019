//! # Receive Path Log Helpers
//!
//! A noisy band can produce an undecodable frame every few milliseconds, so
//! per-frame warnings go through a [`LogThrottle`]. Payload dumps are capped.
//!
//! ```rust
//! use mihome_rs::util::logging::LogThrottle;
//! use std::time::Duration;
//!
//! let mut throttle = LogThrottle::new(Duration::from_secs(1), 5);
//! mihome_rs::log_warn_throttled!(throttle, "Dropping undecodable payload");
//! ```

use std::time::{Duration, Instant};

const MAX_LOG_BYTES: usize = 64;

/// Fixed-window rate limit for log lines.
#[derive(Debug)]
pub struct LogThrottle {
    window: Duration,
    cap: u32,
    used: u32,
    opened: Instant,
    /// Refused since the window that last allowed a line
    suppressed: u64,
}

impl LogThrottle {
    pub fn new(window: Duration, cap: u32) -> Self {
        Self {
            window,
            cap,
            used: 0,
            opened: Instant::now(),
            suppressed: 0,
        }
    }

    /// Takes one slot in the current window, opening a new window when the
    /// old one has run out.
    pub fn allow(&mut self) -> bool {
        if self.opened.elapsed() > self.window {
            self.opened = Instant::now();
            self.used = 0;
        }
        if self.used < self.cap {
            self.used += 1;
            return true;
        }
        self.suppressed += 1;
        false
    }

    /// Returns and clears the number of refused lines.
    pub fn take_suppressed(&mut self) -> u64 {
        std::mem::take(&mut self.suppressed)
    }
}

/// `log::warn!` through a [`LogThrottle`]. The first line after a quiet
/// spell also reports how many were swallowed.
#[macro_export]
macro_rules! log_warn_throttled {
    ($throttle:expr, $($arg:tt)*) => {
        if $throttle.allow() {
            let skipped = $throttle.take_suppressed();
            if skipped > 0 {
                log::warn!("{} similar warnings suppressed", skipped);
            }
            log::warn!($($arg)*);
        }
    };
}

/// Hex dump of a payload at debug level, cut off after 64 bytes.
pub fn log_frame_hex(prefix: &str, data: &[u8]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let shown = &data[..data.len().min(MAX_LOG_BYTES)];
    if data.len() > MAX_LOG_BYTES {
        log::debug!(
            "{prefix}: {} .. ({} bytes)",
            crate::util::hex::format_hex_compact(shown),
            data.len()
        );
    } else {
        log::debug!("{prefix}: {}", crate::util::hex::format_hex_compact(shown));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_per_window() {
        let mut throttle = LogThrottle::new(Duration::from_secs(60), 3);
        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(throttle.allow());
        assert!(!throttle.allow());
        assert!(!throttle.allow());
        assert_eq!(throttle.take_suppressed(), 2);
        assert_eq!(throttle.take_suppressed(), 0);
    }

    #[test]
    fn test_window_reopens() {
        let mut throttle = LogThrottle::new(Duration::from_millis(1), 1);
        assert!(throttle.allow());
        assert!(!throttle.allow());
        std::thread::sleep(Duration::from_millis(5));
        assert!(throttle.allow());
        assert_eq!(throttle.take_suppressed(), 1);
    }
}
