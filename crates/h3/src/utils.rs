//! Utility macros used across the crate.

/// Returns early with `$error` unless `$predicate` holds.
///
/// Like `assert!`, but for fallible paths: stream state checks use it to
/// reject writes once a stream can no longer carry data.
///
/// ```ignore
/// ensure!(!core.headers_sent, StreamError::HeadersAlreadySent);
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
