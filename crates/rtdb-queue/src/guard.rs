use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run `f`, isolating any panic it raises so a faulty user callback can
/// never abort the engine's drain loop (`spec.md` §7, `CallbackFault`).
///
/// This is the Rust analogue of the exception guard the spec describes
/// around `callOnCompleteCallback` and event delivery: we cannot recover a
/// panicking closure's outer state in general, but `catch_unwind` is
/// sufficient here because every callback is a self-contained `FnOnce`/
/// `FnMut` with no shared mutable state reachable from outside its
/// closure — the engine's own fields are never borrowed across the call.
pub fn call_guarded<F: FnOnce()>(what: &str, f: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
        let message = panic_message(&payload);
        tracing::error!(target: "rtdb", callback = what, %message, "callback panicked; isolated");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
