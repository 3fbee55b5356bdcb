//! Format-parameter (`a=fmtp`) compatibility between a local codec and a
//! codec the remote peer advertises.
//!
//! Most parameters are opaque. The ones that select a distinct codec
//! variant must agree:
//!
//! | Codec | Parameter | Default when absent |
//! |-------|-----------|---------------------|
//! | H.264 | `packetization-mode` | `0` (RFC 6184 §8.1) |
//! | H.264 | `profile-level-id` | none: must match exactly when the local entry has one |
//! | VP9 | `profile-id` | `0` (RFC 9628 §6) |
//!
//! `apt` on RTX entries is checked by the negotiator, which knows how the
//! referenced payload types were matched.

use super::codec::{CodecCapability, MIME_TYPE_H264, MIME_TYPE_VP9};
use crate::sdp::RemoteCodec;

/// Parse `key=value;key=value` into lowercase keys and trimmed values.
/// A bare `key` gets an empty value.
pub fn parse(line: &str) -> Vec<(String, String)> {
    line.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim().to_string()),
            None => (p.to_ascii_lowercase(), String::new()),
        })
        .collect()
}

/// Value of `key` in a parsed fmtp line.
pub fn parameter<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Whether `remote` describes the same codec variant as `local`, apart
/// from payload type numbering and RTX association.
pub fn matches(local: &CodecCapability, remote: &RemoteCodec) -> bool {
    if !local.mime_type.eq_ignore_ascii_case(&remote.mime_type) {
        return false;
    }
    if local.clock_rate != remote.clock_rate {
        return false;
    }
    if local.channels != 0 && remote.channels != 0 && local.channels != remote.channels {
        return false;
    }

    let local_params = parse(&local.sdp_fmtp_line);
    let remote_params = parse(&remote.fmtp);

    if local.mime_type.eq_ignore_ascii_case(MIME_TYPE_H264) {
        let mode = |p: &[(String, String)]| {
            parameter(p, "packetization-mode").unwrap_or("0").to_string()
        };
        if mode(&local_params) != mode(&remote_params) {
            return false;
        }
        if let Some(local_profile) = parameter(&local_params, "profile-level-id") {
            match parameter(&remote_params, "profile-level-id") {
                Some(remote_profile) if remote_profile.eq_ignore_ascii_case(local_profile) => {}
                _ => return false,
            }
        }
    } else if local.mime_type.eq_ignore_ascii_case(MIME_TYPE_VP9) {
        let profile = |p: &[(String, String)]| {
            parameter(p, "profile-id").unwrap_or("0").to_string()
        };
        if profile(&local_params) != profile(&remote_params) {
            return false;
        }
    }

    true
}
