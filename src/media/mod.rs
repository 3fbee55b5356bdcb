//! RTP wire primitives and per-codec payloaders.
//!
//! This module provides the [`Payloader`] trait, the closed
//! [`CodecPayloader`] set selected by codec mime type, the [`Packetizer`]
//! that turns one media sample into a run of RTP packets, and the RTP
//! [`rtp::Packet`] codec.
//!
//! ## RTP overview (RFC 3550)
//!
//! Each encoded media unit is split into one or more RTP packets.
//! Every RTP packet carries a 12-byte fixed header ([`rtp::Header`])
//! containing:
//!
//! - **Sequence number** (16-bit, wrapping): for reordering and loss detection.
//! - **Timestamp** (32-bit): media clock (48 kHz for Opus, 90 kHz for video).
//! - **SSRC** (32-bit): identifies the sender's stream.
//! - **Marker bit**: set on the last packet of a sample.
//!
//! ## Supported codecs
//!
//! | Codec | Module | RFC |
//! |-------|--------|-----|
//! | H.264 | [`h264`] | [RFC 6184](https://tools.ietf.org/html/rfc6184) |
//! | VP8 | [`vp8`] | [RFC 7741](https://tools.ietf.org/html/rfc7741) |
//! | VP9 | [`vp9`] | [RFC 9628](https://tools.ietf.org/html/rfc9628) |
//! | Opus | [`opus`] | [RFC 7587](https://tools.ietf.org/html/rfc7587) |
//! | PCMU / PCMA / G.722 | [`g7xx`] | [RFC 3551](https://tools.ietf.org/html/rfc3551) |

pub mod g7xx;
pub mod h264;
pub mod opus;
pub mod packetizer;
pub mod rtp;
pub mod vp8;
pub mod vp9;

pub use packetizer::{Packetizer, Sequencer};

use crate::engine::codec::{
    MIME_TYPE_G722, MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_PCMA, MIME_TYPE_PCMU,
    MIME_TYPE_VP8, MIME_TYPE_VP9,
};

/// Codec-specific RTP payload fragmentation.
///
/// A payloader only produces payload bytes: the RTP header is stamped by
/// the [`Packetizer`] that owns it.
///
/// ## Implementing a new codec
///
/// 1. Create a new module (e.g. `media/av1.rs`)
/// 2. Implement `Payloader` for your type
/// 3. Add a variant to [`CodecPayloader`] and its mime type to
///    [`CodecPayloader::for_mime_type`]
pub trait Payloader: Send {
    /// Fragment one encoded media unit into payloads of at most `mtu` bytes.
    ///
    /// An empty unit yields no payloads.
    fn payload(&mut self, mtu: usize, data: &[u8]) -> Vec<Vec<u8>>;
}

/// The closed set of payloaders a sample track can be bound with.
#[derive(Debug, Clone)]
pub enum CodecPayloader {
    H264(h264::H264Payloader),
    Vp8(vp8::Vp8Payloader),
    Vp9(vp9::Vp9Payloader),
    Opus(opus::OpusPayloader),
    /// PCMU and PCMA.
    G711(g7xx::G7xxPayloader),
    G722(g7xx::G7xxPayloader),
}

impl CodecPayloader {
    /// Pick the payloader for a codec mime type, `None` if unsupported.
    ///
    /// Mime types compare case-insensitively (RFC 6838 §4.2).
    pub fn for_mime_type(mime_type: &str) -> Option<Self> {
        let is = |m: &str| mime_type.eq_ignore_ascii_case(m);
        if is(MIME_TYPE_H264) {
            Some(Self::H264(h264::H264Payloader::new()))
        } else if is(MIME_TYPE_VP8) {
            Some(Self::Vp8(vp8::Vp8Payloader::new()))
        } else if is(MIME_TYPE_VP9) {
            Some(Self::Vp9(vp9::Vp9Payloader::new()))
        } else if is(MIME_TYPE_OPUS) {
            Some(Self::Opus(opus::OpusPayloader::new()))
        } else if is(MIME_TYPE_PCMU) || is(MIME_TYPE_PCMA) {
            Some(Self::G711(g7xx::G7xxPayloader::new()))
        } else if is(MIME_TYPE_G722) {
            Some(Self::G722(g7xx::G7xxPayloader::new()))
        } else {
            None
        }
    }

    /// Short codec family name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::H264(_) => "H264",
            Self::Vp8(_) => "VP8",
            Self::Vp9(_) => "VP9",
            Self::Opus(_) => "opus",
            Self::G711(_) => "G711",
            Self::G722(_) => "G722",
        }
    }
}

impl Payloader for CodecPayloader {
    fn payload(&mut self, mtu: usize, data: &[u8]) -> Vec<Vec<u8>> {
        match self {
            Self::H264(p) => p.payload(mtu, data),
            Self::Vp8(p) => p.payload(mtu, data),
            Self::Vp9(p) => p.payload(mtu, data),
            Self::Opus(p) => p.payload(mtu, data),
            Self::G711(p) | Self::G722(p) => p.payload(mtu, data),
        }
    }
}
