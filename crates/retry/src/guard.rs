// Panic containment for user-supplied predicates and event handlers
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

/// Run `f`, returning `None` if it panics.
///
/// User callbacks are observation-only or advisory, so a panic inside one is
/// logged and discarded instead of propagating into the execution driver.
pub(crate) fn contained<T>(callback: &'static str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            warn!(
                callback,
                reason = panic_message(payload.as_ref()),
                "Ignoring panicking retry callback"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
