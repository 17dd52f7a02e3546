// crates/obdwire/src/frame/mod.rs

//! Request framing and response cleaning for each protocol family.
//!
//! Header builders compile catalog header templates into request header
//! bytes plus an expected-response header/mask pair; the request builder
//! turns parameter attributes into data frames (with ISO 15765 segmentation
//! and ISO 14230 length encoding); the cleaners validate received frames
//! and reduce them to (header, payload) pairs for the decoder.

mod clean;
mod header;
mod request;

pub(crate) use clean::{clean_iso14230, clean_iso15765, clean_legacy};
pub(crate) use header::{build_header_iso14230, build_header_iso15765, build_header_legacy};
pub(crate) use request::build_request_data;

/// Bytewise equality modulo a mask.
///
/// Holds when `bytes` is at least as long as `exp` and every masked bit of
/// `bytes` equals the corresponding masked bit of `exp`.
pub fn matches_masked(exp: &[u8], mask: &[u8], bytes: &[u8]) -> bool {
    if bytes.len() < exp.len() {
        return false;
    }
    exp.iter()
        .zip(mask)
        .zip(bytes)
        .all(|((e, m), b)| (m & b) == (m & e))
}

/// Returns the payload with `prefix` removed from the front, or `None` when
/// the payload does not start with it.
pub(crate) fn strip_expected_prefix(prefix: &[u8], data: &[u8]) -> Option<Vec<u8>> {
    data.starts_with(prefix)
        .then(|| data[prefix.len()..].to_vec())
}
