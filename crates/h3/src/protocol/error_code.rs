//! HTTP/3 application error codes.
//!
//! Codes cross the transport boundary verbatim inside `RESET_STREAM` and
//! `STOP_SENDING` frames, and the peer inspects them programmatically. The
//! constants below are the registered values from RFC 9114 §8.1 and must not
//! be altered.

use std::fmt;

/// A numeric application error code carried by a stream abort.
///
/// Any `u64` is accepted so that application-chosen codes pass through
/// unchanged; the well-known codes are available as associated constants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(u64);

macro_rules! error_codes {
    ($($name:ident = $value:literal;)+) => {
        impl ErrorCode {
            $(
                pub const $name: ErrorCode = ErrorCode($value);
            )+

            /// Returns the registered name of this code, if it is one of the
            /// RFC 9114 codes.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)+
                    _ => None,
                }
            }
        }
    };
}

error_codes! {
    H3_NO_ERROR = 0x0100;
    H3_GENERAL_PROTOCOL_ERROR = 0x0101;
    H3_INTERNAL_ERROR = 0x0102;
    H3_STREAM_CREATION_ERROR = 0x0103;
    H3_CLOSED_CRITICAL_STREAM = 0x0104;
    H3_FRAME_UNEXPECTED = 0x0105;
    H3_FRAME_ERROR = 0x0106;
    H3_EXCESSIVE_LOAD = 0x0107;
    H3_ID_ERROR = 0x0108;
    H3_SETTINGS_ERROR = 0x0109;
    H3_MISSING_SETTINGS = 0x010a;
    H3_REQUEST_REJECTED = 0x010b;
    H3_REQUEST_CANCELLED = 0x010c;
    H3_REQUEST_INCOMPLETE = 0x010d;
    H3_MESSAGE_ERROR = 0x010e;
    H3_CONNECT_ERROR = 0x010f;
    H3_VERSION_FALLBACK = 0x0110;
}

impl ErrorCode {
    /// Wraps a raw code without validation.
    #[inline]
    pub const fn new(code: u64) -> Self {
        Self(code)
    }

    /// The raw value put on the wire.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for ErrorCode {
    fn from(code: u64) -> Self {
        Self(code)
    }
}

impl From<ErrorCode> for u64 {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({:#06x})", self.0),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_codes_match_wire_values() {
        assert_eq!(ErrorCode::H3_INTERNAL_ERROR.value(), 0x0102);
        assert_eq!(ErrorCode::H3_REQUEST_REJECTED.value(), 0x010b);
        assert_eq!(ErrorCode::H3_REQUEST_CANCELLED.value(), 0x010c);
        assert_eq!(ErrorCode::H3_VERSION_FALLBACK.value(), 0x0110);
    }

    #[test]
    fn application_codes_pass_through() {
        let code = ErrorCode::from(0xdead_beef_u64);
        assert_eq!(u64::from(code), 0xdead_beef);
        assert_eq!(code.name(), None);
        assert_eq!(code.to_string(), "0xdeadbeef");
    }

    #[test]
    fn display_includes_name_and_value() {
        assert_eq!(ErrorCode::H3_REQUEST_CANCELLED.to_string(), "H3_REQUEST_CANCELLED (0x010c)");
        assert_eq!(ErrorCode::new(0x010b), ErrorCode::H3_REQUEST_REJECTED);
    }
}
