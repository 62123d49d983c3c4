//! The programmer-error channel: log then abort.
//!
//! Recoverable failure (out of memory) returns `null`/`false`/a sentinel
//! status to the caller, same as `malloc`. Programmer error — a null handle
//! where one is required, an `unref` naming a parent that is not actually a
//! parent — is not recoverable in the same way: there is no sensible value
//! to return, so it is logged at `error!` and the process aborts, the same
//! discipline the teacher crate uses for refcount overflow.

/// Logs `$($arg)+` at `error!` and aborts the process if `$cond` is false.
macro_rules! fatal_assert {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            log::error!($($arg)+);
            std::process::abort();
        }
    };
}

pub(crate) use fatal_assert;
