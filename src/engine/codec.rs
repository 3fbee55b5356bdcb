use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;

static CODEC_COUNTER: AtomicU64 = AtomicU64::new(0);

/// H.264 mime type. Matching is case-insensitive.
pub const MIME_TYPE_H264: &str = "video/H264";
pub const MIME_TYPE_VP8: &str = "video/VP8";
pub const MIME_TYPE_VP9: &str = "video/VP9";
/// Retransmission (RFC 4588); `apt` names the protected payload type.
pub const MIME_TYPE_RTX: &str = "video/rtx";
/// Forward error correction (RFC 5109).
pub const MIME_TYPE_ULPFEC: &str = "video/ulpfec";
pub const MIME_TYPE_OPUS: &str = "audio/opus";
pub const MIME_TYPE_G722: &str = "audio/G722";
pub const MIME_TYPE_PCMU: &str = "audio/PCMU";
pub const MIME_TYPE_PCMA: &str = "audio/PCMA";

/// Audio or video. Codec and header-extension catalogs are partitioned by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Kind implied by a mime type's top-level type (`audio/...`, `video/...`).
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        let (top, _) = mime_type.split_once('/')?;
        top.parse().ok()
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    /// Case-insensitive `audio` / `video`, as found on an SDP `m=` line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("audio") {
            Ok(Self::Audio)
        } else if s.eq_ignore_ascii_case("video") {
            Ok(Self::Video)
        } else {
            Err(Error::UnknownMediaKind(s.to_string()))
        }
    }
}

/// An RTCP feedback mechanism (`a=rtcp-fb`, RFC 4585 §4.2), e.g. `nack pli`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpFeedback {
    pub typ: String,
    pub parameter: String,
}

impl RtcpFeedback {
    pub fn new(typ: &str, parameter: &str) -> Self {
        Self {
            typ: typ.to_string(),
            parameter: parameter.to_string(),
        }
    }
}

/// What a codec is, independent of any payload type assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecCapability {
    pub mime_type: String,
    pub clock_rate: u32,
    /// 0 when unspecified or not applicable.
    pub channels: u16,
    /// `key=value;key=value` format parameters, as in `a=fmtp`.
    pub sdp_fmtp_line: String,
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl CodecCapability {
    pub fn new(mime_type: &str, clock_rate: u32, channels: u16, sdp_fmtp_line: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            clock_rate,
            channels,
            sdp_fmtp_line: sdp_fmtp_line.to_string(),
            rtcp_feedback: Vec::new(),
        }
    }

    pub fn with_feedback(mut self, rtcp_feedback: Vec<RtcpFeedback>) -> Self {
        self.rtcp_feedback = rtcp_feedback;
        self
    }

    /// Kind implied by the mime type, `None` for anything but audio/video.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime_type(&self.mime_type)
    }

    pub fn is_rtx(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(MIME_TYPE_RTX)
    }
}

/// A registered codec variant and its negotiation state.
///
/// The capability never changes after registration. Negotiation flips
/// [`negotiated`](Self::negotiated) and may rewrite
/// [`payload_type`](Self::payload_type) to the value the remote peer uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParameters {
    pub capability: CodecCapability,
    pub payload_type: u8,
    pub(crate) negotiated: bool,
    pub(crate) registered_payload_type: u8,
    pub(crate) registry_id: String,
}

impl CodecParameters {
    pub fn new(capability: CodecCapability, payload_type: u8) -> Self {
        Self {
            capability,
            payload_type,
            negotiated: false,
            registered_payload_type: payload_type,
            registry_id: String::new(),
        }
    }

    /// Mint a fresh registry id and reset negotiation state.
    pub(crate) fn registered(mut self) -> Self {
        let n = CODEC_COUNTER.fetch_add(1, Ordering::SeqCst);
        self.registry_id = format!("RTPCodec-{n:016X}");
        self.negotiated = false;
        self.registered_payload_type = self.payload_type;
        self
    }

    pub fn mime_type(&self) -> &str {
        &self.capability.mime_type
    }

    /// Whether the remote peer has agreed to this codec.
    pub fn negotiated(&self) -> bool {
        self.negotiated
    }

    /// Stable identifier minted at registration, for stats correlation.
    pub fn registry_id(&self) -> &str {
        &self.registry_id
    }

    /// Payload type this entry was registered with, before any remote rewrite.
    pub fn registered_payload_type(&self) -> u8 {
        self.registered_payload_type
    }
}
