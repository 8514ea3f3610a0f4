//! Desktop notification surface for the watch-mode error boundary
//!
//! Task failures under watch are shown as desktop notifications instead of
//! killing the process. Display failures (headless CI, no notification
//! daemon) are swallowed; every message is mirrored to stderr so nothing
//! is lost.

use std::sync::atomic::{AtomicBool, Ordering};

use notify_rust::Notification;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Enable or disable desktop notifications.
///
/// The production pipeline and the test suite run with notifications off.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Report a task error. Non-fatal: the watch loop keeps running.
pub fn error(title: &str, body: &str) {
    eprintln!("{}: {}", title, body);
    if enabled() {
        let _ = Notification::new().summary(title).body(body).show();
    }
}

/// Report a task success (e.g. "Sass compiled").
pub fn success(body: &str) {
    if enabled() {
        let _ = Notification::new().summary("webforge").body(body).show();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        set_enabled(false);
        assert!(!enabled());
        // error() must not panic with notifications disabled
        error("webforge", "test message");
        set_enabled(true);
    }
}
