//! Turning caught panics into [`PanicError`]s.
//!
//! `catch_unwind` runs after the stack has unwound, so a backtrace taken there
//! only shows the catch site. [`install_capture_hook`] adds a panic hook that
//! records the backtrace of the panicking frame in a thread local; the
//! interceptor takes it right after catching, on the same thread. Without the
//! hook the catch-site backtrace is used instead.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;

use crate::error::PanicError;

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Install the backtrace-capturing panic hook. Runs once per process and
/// chains to the previously installed hook.
pub fn install_capture_hook() {
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            let _ = LAST_PANIC_TRACE.try_with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(trace);
                }
            });
            previous(info);
        }));
    });
}

/// Take the trace recorded by the hook for the most recent panic on this thread.
fn take_recorded_trace() -> Option<String> {
    LAST_PANIC_TRACE
        .try_with(|slot| slot.try_borrow_mut().ok().and_then(|mut s| s.take()))
        .ok()
        .flatten()
}

/// Best-effort string form of a panic payload.
pub fn payload_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Box<dyn Any>"
    }
}

impl PanicError {
    /// Build from a payload returned by `catch_unwind`.
    ///
    /// Must be called on the thread that caught the panic.
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let stack_trace =
            take_recorded_trace().unwrap_or_else(|| Backtrace::force_capture().to_string());
        PanicError::new(format!("Panic: {}", payload_message(payload)), stack_trace)
    }
}
