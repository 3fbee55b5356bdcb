use crate::error::{Error, Result, UnmarshalErrorKind};

/// Size of the RTP fixed header without CSRCs or extension.
pub const HEADER_LENGTH: usize = 12;

const VERSION: u8 = 2;
const VERSION_SHIFT: u8 = 6;
const PADDING_BIT: u8 = 0x20;
const EXTENSION_BIT: u8 = 0x10;
const CC_MASK: u8 = 0x0f;
const MARKER_BIT: u8 = 0x80;
const PT_MASK: u8 = 0x7f;

/// RTP fixed header (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |                       CSRC list (0-15)                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Version is always 2 on the wire. The header extension (RFC 3550 §5.3.1)
/// is carried opaquely as a profile plus its body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub padding: bool,
    pub marker: bool,
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    /// `(profile, body)` of the header extension, body length a multiple of 4.
    pub extension: Option<(u16, Vec<u8>)>,
}

impl Header {
    /// Serialized length of this header.
    pub fn marshal_size(&self) -> usize {
        let ext = self.extension.as_ref().map_or(0, |(_, body)| 4 + padded_len(body.len()));
        HEADER_LENGTH + self.csrc.len() * 4 + ext
    }

    /// Serialize the header into `buf`.
    pub fn marshal_to(&self, buf: &mut Vec<u8>) {
        let csrc_count = self.csrc.len().min(15) as u8;
        let mut first = (VERSION << VERSION_SHIFT) | csrc_count;
        if self.padding {
            first |= PADDING_BIT;
        }
        if self.extension.is_some() {
            first |= EXTENSION_BIT;
        }
        let second = ((self.marker as u8) << 7) | (self.payload_type & PT_MASK);

        buf.push(first);
        buf.push(second);
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.timestamp.to_be_bytes());
        buf.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in self.csrc.iter().take(15) {
            buf.extend_from_slice(&csrc.to_be_bytes());
        }

        if let Some((profile, body)) = &self.extension {
            let words = padded_len(body.len()) / 4;
            buf.extend_from_slice(&profile.to_be_bytes());
            buf.extend_from_slice(&(words as u16).to_be_bytes());
            buf.extend_from_slice(body);
            buf.resize(buf.len() + padded_len(body.len()) - body.len(), 0);
        }
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.marshal_size());
        self.marshal_to(&mut buf);
        buf
    }

    /// Parse a header from the start of `raw`, returning it and its length.
    pub fn unmarshal(raw: &[u8]) -> Result<(Self, usize)> {
        if raw.len() < HEADER_LENGTH {
            return Err(unmarshal_err(UnmarshalErrorKind::HeaderTooShort));
        }
        if raw[0] >> VERSION_SHIFT != VERSION {
            return Err(unmarshal_err(UnmarshalErrorKind::InvalidVersion));
        }

        let padding = raw[0] & PADDING_BIT != 0;
        let has_extension = raw[0] & EXTENSION_BIT != 0;
        let csrc_count = (raw[0] & CC_MASK) as usize;
        let marker = raw[1] & MARKER_BIT != 0;
        let payload_type = raw[1] & PT_MASK;
        let sequence_number = u16::from_be_bytes([raw[2], raw[3]]);
        let timestamp = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
        let ssrc = u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]);

        let mut offset = HEADER_LENGTH;
        if raw.len() < offset + csrc_count * 4 {
            return Err(unmarshal_err(UnmarshalErrorKind::HeaderTooShort));
        }
        let csrc = raw[offset..offset + csrc_count * 4]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        offset += csrc_count * 4;

        let extension = if has_extension {
            if raw.len() < offset + 4 {
                return Err(unmarshal_err(UnmarshalErrorKind::ExtensionTooShort));
            }
            let profile = u16::from_be_bytes([raw[offset], raw[offset + 1]]);
            let words = u16::from_be_bytes([raw[offset + 2], raw[offset + 3]]) as usize;
            offset += 4;
            if raw.len() < offset + words * 4 {
                return Err(unmarshal_err(UnmarshalErrorKind::ExtensionTooShort));
            }
            let body = raw[offset..offset + words * 4].to_vec();
            offset += words * 4;
            Some((profile, body))
        } else {
            None
        };

        Ok((
            Self {
                padding,
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrc,
                extension,
            },
            offset,
        ))
    }
}

/// An RTP packet: header plus payload, padding already stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Decode a full RTP packet.
    ///
    /// When the padding bit is set, the last byte gives the padding length
    /// (RFC 3550 §5.1) and that many bytes are removed from the payload.
    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        let (mut header, offset) = Header::unmarshal(raw)?;
        let mut end = raw.len();
        if header.padding {
            let pad = *raw
                .last()
                .ok_or_else(|| unmarshal_err(UnmarshalErrorKind::InvalidPadding))?
                as usize;
            if pad == 0 || offset + pad > end {
                return Err(unmarshal_err(UnmarshalErrorKind::InvalidPadding));
            }
            end -= pad;
            header.padding = false;
        }
        Ok(Self {
            header,
            payload: raw[offset..end].to_vec(),
        })
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.header.marshal_size() + self.payload.len());
        self.header.marshal_to(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(4) * 4
}

fn unmarshal_err(kind: UnmarshalErrorKind) -> Error {
    Error::Unmarshal { kind }
}
