//! Parsed SDP session description (RFC 8866), as consumed by negotiation.
//!
//! Text parsing happens elsewhere; this module only models the structure
//! the media engine reads and interprets the attribute values it needs:
//!
//! ```text
//! m=audio 9 UDP/TLS/RTP/SAVPF 111 0        ← MediaDescription { media, formats }
//! a=rtpmap:111 opus/48000/2                ← encoding name / clock rate / channels
//! a=fmtp:111 minptime=10;useinbandfec=1    ← format parameters
//! a=extmap:3 urn:ietf:params:rtp-hdrext:sdes:mid
//! ```
//!
//! Formats listed without an `a=rtpmap` fall back to the static payload
//! types of RFC 3551 §6.

/// One `a=` line: `key[:value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(key: &str, value: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            value: value.map(str::to_string),
        }
    }
}

/// One `m=` section and its attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDescription {
    /// Media type from the `m=` line (`audio`, `video`, `application`, ...).
    pub media: String,
    /// Format list from the `m=` line; RTP payload types for RTP profiles.
    pub formats: Vec<String>,
    pub attributes: Vec<Attribute>,
}

/// Whole session; only the media sections matter to negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDescription {
    pub media_descriptions: Vec<MediaDescription>,
}

/// A codec advertised in a media section, resolved from `m=`, `a=rtpmap`
/// and `a=fmtp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCodec {
    pub payload_type: u8,
    /// `<media>/<encoding name>`, e.g. `audio/opus`.
    pub mime_type: String,
    pub clock_rate: u32,
    /// 0 when the rtpmap omits it.
    pub channels: u16,
    pub fmtp: String,
}

impl MediaDescription {
    pub fn new(media: &str) -> Self {
        Self {
            media: media.to_string(),
            ..Default::default()
        }
    }

    /// Add a codec: its payload type to the format list plus `a=rtpmap`
    /// and, when non-empty, `a=fmtp`.
    pub fn with_codec(mut self, payload_type: u8, rtpmap: &str, fmtp: &str) -> Self {
        self.formats.push(payload_type.to_string());
        self.attributes.push(Attribute::new(
            "rtpmap",
            Some(&format!("{payload_type} {rtpmap}")),
        ));
        if !fmtp.is_empty() {
            self.attributes
                .push(Attribute::new("fmtp", Some(&format!("{payload_type} {fmtp}"))));
        }
        self
    }

    /// Add a bare format (static payload type, no rtpmap).
    pub fn with_format(mut self, payload_type: u8) -> Self {
        self.formats.push(payload_type.to_string());
        self
    }

    /// Add `a=extmap:<id> <uri>`.
    pub fn with_extmap(mut self, id: u16, uri: &str) -> Self {
        self.attributes
            .push(Attribute::new("extmap", Some(&format!("{id} {uri}"))));
        self
    }

    /// First value of attribute `key` whose value starts with `<payload_type> `.
    fn payload_attribute(&self, key: &str, payload_type: u8) -> Option<&str> {
        let prefix = payload_type.to_string();
        self.attributes
            .iter()
            .filter(|a| a.key == key)
            .filter_map(|a| a.value.as_deref())
            .find_map(|v| {
                let (pt, rest) = v.split_once(' ')?;
                (pt == prefix).then_some(rest.trim())
            })
    }

    /// Codecs in format-list order. Formats that are not payload types, or
    /// that have neither an rtpmap nor a static assignment, are skipped.
    pub fn codecs(&self) -> Vec<RemoteCodec> {
        self.formats
            .iter()
            .filter_map(|f| f.parse::<u8>().ok())
            .filter_map(|pt| self.codec(pt))
            .collect()
    }

    fn codec(&self, payload_type: u8) -> Option<RemoteCodec> {
        let (name, clock_rate, channels) = match self.payload_attribute("rtpmap", payload_type) {
            Some(rtpmap) => parse_rtpmap(rtpmap)?,
            None => static_payload_type(payload_type)?,
        };
        Some(RemoteCodec {
            payload_type,
            mime_type: format!("{}/{}", self.media, name),
            clock_rate,
            channels,
            fmtp: self
                .payload_attribute("fmtp", payload_type)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// `(id, uri)` pairs from `a=extmap:<id>[/<direction>] <uri>`.
    pub fn extmaps(&self) -> Vec<(u16, String)> {
        self.attributes
            .iter()
            .filter(|a| a.key == "extmap")
            .filter_map(|a| a.value.as_deref())
            .filter_map(|v| {
                let mut parts = v.split_whitespace();
                let id = parts.next()?.split('/').next()?.parse().ok()?;
                let uri = parts.next()?;
                Some((id, uri.to_string()))
            })
            .collect()
    }
}

/// `opus/48000/2` → `("opus", 48000, 2)`.
fn parse_rtpmap(value: &str) -> Option<(String, u32, u16)> {
    let mut parts = value.split('/');
    let name = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let clock_rate = parts.next()?.trim().parse().ok()?;
    let channels = match parts.next() {
        Some(c) => c.trim().parse().ok()?,
        None => 0,
    };
    Some((name.to_string(), clock_rate, channels))
}

/// Static audio payload types (RFC 3551 §6) the engine knows by name.
fn static_payload_type(payload_type: u8) -> Option<(String, u32, u16)> {
    let name = match payload_type {
        0 => "PCMU",
        8 => "PCMA",
        9 => "G722",
        _ => return None,
    };
    Some((name.to_string(), 8000, 0))
}
