//! Codec and header-extension registry, and negotiation against a remote
//! session description.
//!
//! A [`MediaEngine`] is configured once (single writer, `&mut self`), then
//! shared behind an `Arc` by every connection that uses it. Negotiation
//! takes `&self` and mutates the shared catalog under the engine's lock:
//! concurrent negotiations from independent connections serialize on it.
//!
//! ## Negotiation (offer/answer codec intersection)
//!
//! For each media section of the remote description, in order:
//!
//! 1. The section's kind comes from its `m=` media type, case-insensitively.
//!    Anything but audio/video is skipped.
//! 2. Only the first section of each kind in one description is used; later
//!    ones are skipped entirely. The kind is marked negotiated.
//! 3. Each remote codec is matched against the local catalog of that kind
//!    (mime type, clock rate, channels, and the format parameters that tell
//!    codec variants apart, see [`fmtp`]). A match marks the local entry
//!    negotiated and adopts the remote payload type, since outbound packets
//!    must carry the number the peer expects.
//! 4. RTX entries match when their `apt` points at a remote codec that
//!    matched the local codec the local RTX entry protects.
//! 5. Every `a=extmap` URI registered locally for the kind is marked
//!    negotiated. Registry-assigned ids never change.

pub mod codec;
pub mod defaults;
pub mod fmtp;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::sdp::{MediaDescription, RemoteCodec, SessionDescription};
pub use codec::{CodecCapability, CodecParameters, MediaKind, RtcpFeedback};

/// A header extension known to the engine, keyed by URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderExtension {
    pub uri: String,
    /// Assigned at first registration, stable for the engine's lifetime.
    pub id: u16,
    /// Whether the remote peer has agreed to this extension.
    pub negotiated: bool,
    pub is_audio: bool,
    pub is_video: bool,
}

impl HeaderExtension {
    fn applies_to(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.is_audio,
            MediaKind::Video => self.is_video,
        }
    }
}

#[derive(Debug, Default)]
struct Catalog {
    negotiated_audio: bool,
    negotiated_video: bool,
    /// Set once a description with at least one media section was applied.
    remote_applied: bool,
    audio_codecs: Vec<CodecParameters>,
    video_codecs: Vec<CodecParameters>,
    header_extensions: Vec<HeaderExtension>,
}

impl Catalog {
    fn codecs(&self, kind: MediaKind) -> &Vec<CodecParameters> {
        match kind {
            MediaKind::Audio => &self.audio_codecs,
            MediaKind::Video => &self.video_codecs,
        }
    }

    fn codecs_mut(&mut self, kind: MediaKind) -> &mut Vec<CodecParameters> {
        match kind {
            MediaKind::Audio => &mut self.audio_codecs,
            MediaKind::Video => &mut self.video_codecs,
        }
    }

    fn set_negotiated(&mut self, kind: MediaKind) {
        match kind {
            MediaKind::Audio => self.negotiated_audio = true,
            MediaKind::Video => self.negotiated_video = true,
        }
    }
}

/// The codecs and header extensions an endpoint supports, plus what the
/// remote peer has agreed to.
///
/// Registration is not safe concurrently with anything else; once
/// configured, share the engine (e.g. `Arc<MediaEngine>`) across
/// connections.
#[derive(Debug, Default)]
pub struct MediaEngine {
    catalog: RwLock<Catalog>,
}

impl MediaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a codec to the catalog for `kind`.
    ///
    /// The entry gets a fresh registry id and starts unnegotiated.
    /// Registration order is preference order.
    pub fn register_codec(&mut self, codec: CodecParameters, kind: MediaKind) {
        let codec = codec.registered();
        tracing::debug!(
            kind = %kind,
            mime_type = codec.mime_type(),
            pt = codec.payload_type,
            registry_id = codec.registry_id(),
            "codec registered"
        );
        self.catalog.get_mut().codecs_mut(kind).push(codec);
    }

    /// Register a header extension for `kind`.
    ///
    /// The URI is the identity: registering it again (e.g. for the other
    /// kind) only sets that kind's flag. The id is the catalog position at
    /// first registration.
    pub fn register_header_extension(&mut self, uri: &str, kind: MediaKind) {
        let extensions = &mut self.catalog.get_mut().header_extensions;
        let index = match extensions.iter().position(|e| e.uri == uri) {
            Some(i) => i,
            None => {
                extensions.push(HeaderExtension {
                    uri: uri.to_string(),
                    id: extensions.len() as u16,
                    negotiated: false,
                    is_audio: false,
                    is_video: false,
                });
                tracing::debug!(uri, id = extensions.len() - 1, "header extension registered");
                extensions.len() - 1
            }
        };

        match kind {
            MediaKind::Audio => extensions[index].is_audio = true,
            MediaKind::Video => extensions[index].is_video = true,
        }
    }

    /// Id of a header extension, only once the remote peer has agreed to it.
    pub fn header_extension_id(&self, uri: &str) -> Option<u16> {
        self.catalog
            .read()
            .header_extensions
            .iter()
            .find(|e| e.uri == uri && e.negotiated)
            .map(|e| e.id)
    }

    /// Snapshot of every registered header extension, in id order.
    pub fn header_extensions(&self) -> Vec<HeaderExtension> {
        self.catalog.read().header_extensions.clone()
    }

    /// Header extensions usable for `kind`: every applicable one before
    /// negotiation, only the negotiated ones afterwards.
    pub fn negotiated_header_extensions_for_kind(&self, kind: MediaKind) -> Vec<HeaderExtension> {
        let catalog = self.catalog.read();
        catalog
            .header_extensions
            .iter()
            .filter(|e| e.applies_to(kind))
            .filter(|e| !catalog.remote_applied || e.negotiated)
            .cloned()
            .collect()
    }

    /// Look up a codec by its current payload type.
    ///
    /// A negotiated kind only exposes its negotiated entries: negotiation
    /// renumbers matched entries onto the remote's payload types, which can
    /// collide with entries the remote never agreed to. Negotiated kinds are
    /// searched first (video, then audio), then the full catalog of any kind
    /// not yet negotiated.
    pub fn codec_by_payload_type(&self, payload_type: u8) -> Result<CodecParameters> {
        let catalog = self.catalog.read();
        let negotiated = |kind: MediaKind| match kind {
            MediaKind::Audio => catalog.negotiated_audio,
            MediaKind::Video => catalog.negotiated_video,
        };

        let kinds = [MediaKind::Video, MediaKind::Audio];
        let settled = kinds
            .iter()
            .filter(|&&k| negotiated(k))
            .flat_map(|&k| catalog.codecs(k).iter().filter(|c| c.negotiated));
        let unsettled = kinds
            .iter()
            .filter(|&&k| !negotiated(k))
            .flat_map(|&k| catalog.codecs(k).iter());

        settled
            .chain(unsettled)
            .find(|c| c.payload_type == payload_type)
            .cloned()
            .ok_or(Error::CodecNotFound(payload_type))
    }

    /// The full catalog for `kind`, in registration order.
    pub fn codecs_by_kind(&self, kind: MediaKind) -> Vec<CodecParameters> {
        self.catalog.read().codecs(kind).clone()
    }

    /// Codecs usable for `kind`.
    ///
    /// Before any remote description has been applied this is the full
    /// catalog (used for an initial offer); afterwards only the entries the
    /// remote peer agreed to.
    pub fn negotiated_codecs_for_kind(&self, kind: MediaKind) -> Vec<CodecParameters> {
        let catalog = self.catalog.read();
        let codecs = catalog.codecs(kind);
        if !catalog.remote_applied {
            return codecs.clone();
        }
        codecs.iter().filter(|c| c.negotiated).cloned().collect()
    }

    /// Whether a section of `kind` has been negotiated.
    pub fn is_negotiated(&self, kind: MediaKind) -> bool {
        let catalog = self.catalog.read();
        match kind {
            MediaKind::Audio => catalog.negotiated_audio,
            MediaKind::Video => catalog.negotiated_video,
        }
    }

    /// Apply a remote session description. The description is not modified.
    ///
    /// A description without media sections changes nothing.
    pub fn update_from_remote_description(&self, desc: &SessionDescription) {
        if desc.media_descriptions.is_empty() {
            return;
        }

        let mut catalog = self.catalog.write();
        catalog.remote_applied = true;

        let mut seen_audio = false;
        let mut seen_video = false;
        for media in &desc.media_descriptions {
            let kind = match media.media.parse::<MediaKind>() {
                Ok(kind) => kind,
                Err(_) => {
                    tracing::trace!(media = %media.media, "skipping non-RTP media section");
                    continue;
                }
            };
            let seen = match kind {
                MediaKind::Audio => &mut seen_audio,
                MediaKind::Video => &mut seen_video,
            };
            if *seen {
                tracing::trace!(kind = %kind, "skipping additional media section");
                continue;
            }
            *seen = true;
            catalog.set_negotiated(kind);

            negotiate_codecs(&mut catalog, kind, media);
            negotiate_header_extensions(&mut catalog, kind, media);
        }
    }
}

/// Match one section's codecs against the local catalog for `kind`.
fn negotiate_codecs(catalog: &mut Catalog, kind: MediaKind, media: &MediaDescription) {
    let remote_codecs = media.codecs();
    let local = catalog.codecs_mut(kind);

    // remote payload type → local index, for primary codecs matched in this section
    let mut matched: Vec<(u8, usize)> = Vec::new();
    let mut claimed = vec![false; local.len()];

    for remote in remote_codecs.iter().filter(|r| !is_rtx(r)) {
        let found = local.iter().enumerate().position(|(i, c)| {
            !claimed[i] && !c.capability.is_rtx() && fmtp::matches(&c.capability, remote)
        });
        if let Some(i) = found {
            claimed[i] = true;
            matched.push((remote.payload_type, i));
            adopt(&mut local[i], remote);
        }
    }

    for remote in remote_codecs.iter().filter(|r| is_rtx(r)) {
        // apt of the remote rtx → local codec it resolves to → that codec's registered pt
        let Some(protected) = apt(&remote.fmtp)
            .and_then(|apt| matched.iter().find(|(pt, _)| *pt == apt))
            .map(|&(_, i)| local[i].registered_payload_type)
        else {
            tracing::trace!(pt = remote.payload_type, "rtx without a matched apt");
            continue;
        };

        let found = local.iter().enumerate().position(|(i, c)| {
            !claimed[i]
                && c.capability.is_rtx()
                && c.capability.clock_rate == remote.clock_rate
                && apt(&c.capability.sdp_fmtp_line) == Some(protected)
        });
        if let Some(i) = found {
            claimed[i] = true;
            adopt(&mut local[i], remote);
        }
    }
}

fn adopt(local: &mut CodecParameters, remote: &RemoteCodec) {
    tracing::debug!(
        mime_type = local.mime_type(),
        local_pt = local.payload_type,
        remote_pt = remote.payload_type,
        "codec negotiated"
    );
    local.negotiated = true;
    local.payload_type = remote.payload_type;
}

fn negotiate_header_extensions(catalog: &mut Catalog, kind: MediaKind, media: &MediaDescription) {
    for (remote_id, uri) in media.extmaps() {
        if let Some(ext) = catalog
            .header_extensions
            .iter_mut()
            .find(|e| e.uri == uri && e.applies_to(kind))
        {
            if ext.id != remote_id {
                tracing::trace!(
                    uri = %uri,
                    local_id = ext.id,
                    remote_id,
                    "extension id differs from remote"
                );
            }
            ext.negotiated = true;
        }
    }
}

fn is_rtx(remote: &RemoteCodec) -> bool {
    remote.mime_type.eq_ignore_ascii_case(codec::MIME_TYPE_RTX)
}

fn apt(fmtp_line: &str) -> Option<u8> {
    fmtp::parameter(&fmtp::parse(fmtp_line), "apt")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::codec::*;
    use super::defaults::*;
    use super::*;

    fn default_engine() -> MediaEngine {
        let mut m = MediaEngine::new();
        m.register_default_codecs();
        m
    }

    fn session(media: Vec<MediaDescription>) -> SessionDescription {
        SessionDescription {
            media_descriptions: media,
        }
    }

    fn opus_only() -> SessionDescription {
        session(vec![
            MediaDescription::new("audio").with_codec(111, "opus/48000/2", ""),
        ])
    }

    // --- Registry ---

    #[test]
    fn codec_by_payload_type_scans_both_catalogs() {
        let mut m = MediaEngine::new();
        m.register_codec(
            CodecParameters::new(CodecCapability::new(MIME_TYPE_OPUS, 48000, 2, ""), 111),
            MediaKind::Audio,
        );
        m.register_codec(
            CodecParameters::new(CodecCapability::new(MIME_TYPE_VP8, 90000, 0, ""), 96),
            MediaKind::Video,
        );

        assert_eq!(m.codec_by_payload_type(111).unwrap().mime_type(), MIME_TYPE_OPUS);
        assert_eq!(m.codec_by_payload_type(96).unwrap().mime_type(), MIME_TYPE_VP8);
        assert!(matches!(
            m.codec_by_payload_type(97),
            Err(Error::CodecNotFound(97))
        ));
    }

    #[test]
    fn codec_by_payload_type_prefers_video() {
        let mut m = MediaEngine::new();
        m.register_codec(
            CodecParameters::new(CodecCapability::new(MIME_TYPE_PCMU, 8000, 0, ""), 100),
            MediaKind::Audio,
        );
        m.register_codec(
            CodecParameters::new(CodecCapability::new(MIME_TYPE_VP9, 90000, 0, ""), 100),
            MediaKind::Video,
        );
        assert_eq!(m.codec_by_payload_type(100).unwrap().mime_type(), MIME_TYPE_VP9);
    }

    #[test]
    fn codecs_by_kind_in_registration_order() {
        let m = default_engine();
        let audio: Vec<u8> = m
            .codecs_by_kind(MediaKind::Audio)
            .iter()
            .map(|c| c.payload_type)
            .collect();
        assert_eq!(audio, vec![111, 9, 0, 8]);
        assert_eq!(m.codecs_by_kind(MediaKind::Video)[0].mime_type(), MIME_TYPE_VP8);
    }

    #[test]
    fn header_extension_merged_across_kinds() {
        let mut m = MediaEngine::new();
        m.register_header_extension(TOFFSET_URI, MediaKind::Video);
        m.register_header_extension(SDES_MID_URI, MediaKind::Audio);
        m.register_header_extension(SDES_MID_URI, MediaKind::Video);

        let exts = m.header_extensions();
        assert_eq!(exts.len(), 2);
        assert_eq!(exts[1].uri, SDES_MID_URI);
        assert_eq!(exts[1].id, 1);
        assert!(exts[1].is_audio && exts[1].is_video);
    }

    #[test]
    fn header_extension_hidden_until_negotiated() {
        let mut m = MediaEngine::new();
        m.register_header_extension(SDES_MID_URI, MediaKind::Audio);
        assert_eq!(m.header_extension_id(SDES_MID_URI), None);
        assert_eq!(m.header_extension_id("urn:unknown"), None);

        m.update_from_remote_description(&session(vec![
            MediaDescription::new("audio")
                .with_codec(111, "opus/48000/2", "")
                .with_extmap(7, SDES_MID_URI),
        ]));
        assert_eq!(m.header_extension_id(SDES_MID_URI), Some(0));
    }

    #[test]
    fn header_extension_for_other_kind_not_negotiated() {
        let mut m = MediaEngine::new();
        m.register_header_extension(TOFFSET_URI, MediaKind::Video);
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("audio").with_extmap(1, TOFFSET_URI),
        ]));
        assert_eq!(m.header_extension_id(TOFFSET_URI), None);
    }

    #[test]
    fn negotiated_header_extensions_filtered_after_negotiation() {
        let m = default_engine();
        assert_eq!(m.negotiated_header_extensions_for_kind(MediaKind::Audio).len(), 6);

        m.update_from_remote_description(&session(vec![
            MediaDescription::new("audio")
                .with_codec(111, "opus/48000/2", "")
                .with_extmap(3, AUDIO_LEVEL_URI),
        ]));
        let exts = m.negotiated_header_extensions_for_kind(MediaKind::Audio);
        assert_eq!(exts.len(), 1);
        assert_eq!(exts[0].uri, AUDIO_LEVEL_URI);
    }

    // --- Negotiation ---

    #[test]
    fn no_media_is_noop() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![]));

        assert!(!m.is_negotiated(MediaKind::Audio));
        assert!(!m.is_negotiated(MediaKind::Video));
        assert!(m.codecs_by_kind(MediaKind::Audio).iter().all(|c| !c.negotiated()));
        assert_eq!(
            m.negotiated_codecs_for_kind(MediaKind::Video).len(),
            m.codecs_by_kind(MediaKind::Video).len()
        );
    }

    #[test]
    fn enable_opus() {
        let m = default_engine();
        m.update_from_remote_description(&opus_only());

        assert!(m.is_negotiated(MediaKind::Audio));
        assert!(!m.is_negotiated(MediaKind::Video));

        let opus = m.codec_by_payload_type(111).unwrap();
        assert_eq!(opus.mime_type(), MIME_TYPE_OPUS);
        assert!(opus.negotiated());
    }

    #[test]
    fn remote_payload_type_wins() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("audio").with_codec(112, "opus/48000/2", ""),
        ]));

        let opus = m.codec_by_payload_type(112).unwrap();
        assert_eq!(opus.mime_type(), MIME_TYPE_OPUS);
        assert_eq!(opus.registered_payload_type(), 111);
        assert!(matches!(m.codec_by_payload_type(111), Err(Error::CodecNotFound(111))));
    }

    #[test]
    fn case_insensitive_matching() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("AUDIO").with_codec(111, "OPUS/48000/2", ""),
        ]));
        assert!(m.is_negotiated(MediaKind::Audio));
        assert!(m.codec_by_payload_type(111).unwrap().negotiated());
    }

    #[test]
    fn negotiated_codecs_filtered_after_negotiation() {
        let m = default_engine();
        assert_eq!(m.negotiated_codecs_for_kind(MediaKind::Audio).len(), 4);

        m.update_from_remote_description(&opus_only());
        let audio = m.negotiated_codecs_for_kind(MediaKind::Audio);
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].mime_type(), MIME_TYPE_OPUS);
        assert!(m.negotiated_codecs_for_kind(MediaKind::Video).is_empty());
    }

    #[test]
    fn only_first_section_per_kind() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("audio").with_codec(111, "opus/48000/2", ""),
            MediaDescription::new("audio").with_format(0),
        ]));
        let pcmu = m
            .codecs_by_kind(MediaKind::Audio)
            .into_iter()
            .find(|c| c.mime_type() == MIME_TYPE_PCMU)
            .unwrap();
        assert!(!pcmu.negotiated());
    }

    #[test]
    fn non_rtp_sections_skipped() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![MediaDescription::new("application")]));
        assert!(!m.is_negotiated(MediaKind::Audio));
        assert!(!m.is_negotiated(MediaKind::Video));
    }

    #[test]
    fn static_payload_types_negotiate() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("audio").with_format(0).with_format(8),
        ]));
        let names: Vec<String> = m
            .negotiated_codecs_for_kind(MediaKind::Audio)
            .iter()
            .map(|c| c.mime_type().to_string())
            .collect();
        assert_eq!(names, vec![MIME_TYPE_PCMU, MIME_TYPE_PCMA]);
    }

    #[test]
    fn h264_variant_selected_by_fmtp() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("video").with_codec(
                104,
                "H264/90000",
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
            ),
        ]));

        let video = m.negotiated_codecs_for_kind(MediaKind::Video);
        assert_eq!(video.len(), 1);
        assert_eq!(video[0].payload_type, 104);
        assert_eq!(video[0].registered_payload_type(), 125);
    }

    #[test]
    fn h264_without_matching_profile_not_negotiated() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("video").with_codec(
                104,
                "H264/90000",
                "packetization-mode=1;profile-level-id=640032",
            ),
        ]));
        assert!(m.is_negotiated(MediaKind::Video));
        assert!(m.negotiated_codecs_for_kind(MediaKind::Video).is_empty());
    }

    #[test]
    fn rtx_follows_its_primary() {
        let m = default_engine();
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("video")
                .with_codec(100, "VP8/90000", "")
                .with_codec(101, "rtx/90000", "apt=100")
                .with_codec(102, "rtx/90000", "apt=99"),
        ]));

        let video = m.negotiated_codecs_for_kind(MediaKind::Video);
        let pts: Vec<(String, u8, u8)> = video
            .iter()
            .map(|c| (c.mime_type().to_string(), c.payload_type, c.registered_payload_type()))
            .collect();
        assert_eq!(
            pts,
            vec![
                (MIME_TYPE_VP8.to_string(), 100, 96),
                (MIME_TYPE_RTX.to_string(), 101, 97),
            ]
        );
    }

    #[test]
    fn renumbered_codec_shadows_unnegotiated_entry() {
        let m = default_engine();
        // 96 is VP8's registered payload type.
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("video").with_codec(
                96,
                "H264/90000",
                "packetization-mode=1;profile-level-id=42e01f",
            ),
        ]));

        let found = m.codec_by_payload_type(96).unwrap();
        assert_eq!(found.mime_type(), MIME_TYPE_H264);
        assert!(found.negotiated());

        // Unnegotiated video entries are no longer reachable by payload type.
        assert!(matches!(m.codec_by_payload_type(98), Err(Error::CodecNotFound(98))));
        // Audio was not negotiated, so its full catalog still answers.
        assert_eq!(m.codec_by_payload_type(111).unwrap().mime_type(), MIME_TYPE_OPUS);
    }

    #[test]
    fn renegotiation_rewrites_payload_type_again() {
        let m = default_engine();
        m.update_from_remote_description(&opus_only());
        m.update_from_remote_description(&session(vec![
            MediaDescription::new("audio").with_codec(120, "opus/48000/2", ""),
        ]));
        assert_eq!(m.codec_by_payload_type(120).unwrap().mime_type(), MIME_TYPE_OPUS);
    }

    #[test]
    fn concurrent_negotiation_is_consistent() {
        use std::sync::Arc;
        use std::thread;

        let m = Arc::new(default_engine());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    m.update_from_remote_description(&opus_only());
                    m.negotiated_codecs_for_kind(MediaKind::Audio)
                })
            })
            .collect();
        for h in handles {
            let audio = h.join().unwrap();
            assert_eq!(audio.len(), 1);
            assert_eq!(audio[0].payload_type, 111);
        }
    }
}
