//! Path-segment quoting for the management API
//!
//! Entity names appear as single path segments in API URLs and must be
//! encoded the way the broker itself quotes them: everything except RFC 3986
//! unreserved characters is escaped, so the default vhost `/` becomes the
//! literal segment `%2F`.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Encode set for one path segment: unreserved characters stay, everything
/// else (including `/`) is escaped.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode an entity name into a single URL path segment
pub fn encode_segment(name: &str) -> String {
    utf8_percent_encode(name, SEGMENT).to_string()
}

/// Decode a percent-encoded path segment back into the raw name
pub fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}
