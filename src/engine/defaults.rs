//! The stock codec and header-extension set.
//!
//! Registration order is preference order: offers list codecs in the order
//! they appear here.

use super::MediaEngine;
use super::codec::{
    CodecCapability, CodecParameters, MIME_TYPE_G722, MIME_TYPE_H264, MIME_TYPE_OPUS,
    MIME_TYPE_PCMA, MIME_TYPE_PCMU, MIME_TYPE_RTX, MIME_TYPE_ULPFEC, MIME_TYPE_VP8,
    MIME_TYPE_VP9, MediaKind, RtcpFeedback,
};

pub const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
pub const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
pub const TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
pub const SDES_MID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
pub const SDES_RTP_STREAM_ID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id";
pub const SDES_REPAIRED_RTP_STREAM_ID_URI: &str =
    "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id";
pub const TOFFSET_URI: &str = "urn:ietf:params:rtp-hdrext:toffset";
pub const VIDEO_ORIENTATION_URI: &str = "urn:3gpp:video-orientation";
pub const PLAYOUT_DELAY_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/playout-delay";

const AUDIO_EXTENSIONS: &[&str] = &[
    AUDIO_LEVEL_URI,
    ABS_SEND_TIME_URI,
    TRANSPORT_CC_URI,
    SDES_MID_URI,
    SDES_RTP_STREAM_ID_URI,
    SDES_REPAIRED_RTP_STREAM_ID_URI,
];

const VIDEO_EXTENSIONS: &[&str] = &[
    TOFFSET_URI,
    ABS_SEND_TIME_URI,
    VIDEO_ORIENTATION_URI,
    TRANSPORT_CC_URI,
    PLAYOUT_DELAY_URI,
    SDES_MID_URI,
    SDES_RTP_STREAM_ID_URI,
    SDES_REPAIRED_RTP_STREAM_ID_URI,
];

/// `(fmtp, payload type, rtx payload type)` for each H.264 variant.
const H264_VARIANTS: &[(&str, u8, u8)] = &[
    (
        "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f",
        102,
        121,
    ),
    (
        "level-asymmetry-allowed=1;packetization-mode=0;profile-level-id=42001f",
        127,
        120,
    ),
    (
        "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
        125,
        107,
    ),
    (
        "level-asymmetry-allowed=1;packetization-mode=0;profile-level-id=42e01f",
        108,
        109,
    ),
];

fn video_feedback() -> Vec<RtcpFeedback> {
    vec![
        RtcpFeedback::new("goog-remb", ""),
        RtcpFeedback::new("transport-cc", ""),
        RtcpFeedback::new("ccm", "fir"),
        RtcpFeedback::new("nack", ""),
        RtcpFeedback::new("nack", "pli"),
    ]
}

fn rtx(apt: u8, payload_type: u8) -> CodecParameters {
    CodecParameters::new(
        CodecCapability::new(MIME_TYPE_RTX, 90000, 0, &format!("apt={apt}")),
        payload_type,
    )
}

pub(super) fn default_audio_codecs() -> Vec<CodecParameters> {
    vec![
        CodecParameters::new(
            CodecCapability::new(MIME_TYPE_OPUS, 48000, 2, "minptime=10;useinbandfec=1")
                .with_feedback(vec![RtcpFeedback::new("transport-cc", "")]),
            111,
        ),
        CodecParameters::new(CodecCapability::new(MIME_TYPE_G722, 8000, 0, ""), 9),
        CodecParameters::new(CodecCapability::new(MIME_TYPE_PCMU, 8000, 0, ""), 0),
        CodecParameters::new(CodecCapability::new(MIME_TYPE_PCMA, 8000, 0, ""), 8),
    ]
}

pub(super) fn default_video_codecs() -> Vec<CodecParameters> {
    let video = |mime: &str, fmtp: &str, pt: u8| {
        CodecParameters::new(
            CodecCapability::new(mime, 90000, 0, fmtp).with_feedback(video_feedback()),
            pt,
        )
    };

    let mut codecs = vec![
        video(MIME_TYPE_VP8, "", 96),
        rtx(96, 97),
        video(MIME_TYPE_VP9, "profile-id=0", 98),
        rtx(98, 99),
        video(MIME_TYPE_VP9, "profile-id=1", 100),
        rtx(100, 101),
    ];
    for &(fmtp, pt, rtx_pt) in H264_VARIANTS {
        codecs.push(video(MIME_TYPE_H264, fmtp, pt));
        codecs.push(rtx(pt, rtx_pt));
    }
    codecs.push(CodecParameters::new(
        CodecCapability::new(MIME_TYPE_ULPFEC, 90000, 0, ""),
        116,
    ));
    codecs
}

impl MediaEngine {
    /// Register the stock codec and header-extension set.
    ///
    /// Audio: opus, G.722, PCMU, PCMA. Video: VP8, VP9 profiles 0 and 1, four
    /// H.264 variants, each with an RTX companion, plus ULPFEC.
    ///
    /// Setup only: must not race negotiation or lookups.
    pub fn register_default_codecs(&mut self) {
        for codec in default_audio_codecs() {
            self.register_codec(codec, MediaKind::Audio);
        }
        for uri in AUDIO_EXTENSIONS {
            self.register_header_extension(uri, MediaKind::Audio);
        }
        for codec in default_video_codecs() {
            self.register_codec(codec, MediaKind::Video);
        }
        for uri in VIDEO_EXTENSIONS {
            self.register_header_extension(uri, MediaKind::Video);
        }

        tracing::info!(
            audio_codecs = self.codecs_by_kind(MediaKind::Audio).len(),
            video_codecs = self.codecs_by_kind(MediaKind::Video).len(),
            "default codecs registered"
        );
    }
}
