//! Error types for the media engine and local tracks.

use std::fmt;

/// Errors that can occur in the media engine and local tracks.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Registry**: [`UnknownMediaKind`](Self::UnknownMediaKind),
///   [`CodecNotFound`](Self::CodecNotFound).
/// - **Binding**: [`UnsupportedCodec`](Self::UnsupportedCodec),
///   [`UnbindFailed`](Self::UnbindFailed),
///   [`NoPayloaderForCodec`](Self::NoPayloaderForCodec).
/// - **Wire**: [`Unmarshal`](Self::Unmarshal) for malformed RTP bytes.
/// - **Delivery**: [`WriteFailed`](Self::WriteFailed) aggregates per-binding
///   failures, [`Io`](Self::Io) is what a write sink reports.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O or socket error reported by a write sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A media kind string was neither `audio` nor `video`.
    #[error("unknown media kind: {0}")]
    UnknownMediaKind(String),

    /// No registered codec carries the requested payload type.
    #[error("codec not found for payload type {0}")]
    CodecNotFound(u8),

    /// None of the negotiated codecs offered at bind time matches the track's codec.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Unbind was called with a write sink that is not bound to the track.
    #[error("unbind failed: no binding for this write stream")]
    UnbindFailed,

    /// The track's codec has no payloader in the supported set.
    #[error("no payloader for codec: {0}")]
    NoPayloaderForCodec(String),

    /// Failed to decode an RTP packet (RFC 3550 §5.1).
    #[error("RTP unmarshal error: {kind}")]
    Unmarshal { kind: UnmarshalErrorKind },

    /// One or more bindings failed during fan-out; the others were written.
    #[error("write failed on {} binding(s): {}", .0.len(), .0)]
    WriteFailed(WriteErrors),
}

/// Specific kind of RTP decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmarshalErrorKind {
    /// Fewer than 12 bytes, or the CSRC list runs past the end.
    HeaderTooShort,
    /// Version field was not 2.
    InvalidVersion,
    /// Extension bit set but the extension header or body is truncated.
    ExtensionTooShort,
    /// Padding length byte exceeds the payload.
    InvalidPadding,
}

impl fmt::Display for UnmarshalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderTooShort => write!(f, "header too short"),
            Self::InvalidVersion => write!(f, "invalid version"),
            Self::ExtensionTooShort => write!(f, "header extension too short"),
            Self::InvalidPadding => write!(f, "invalid padding length"),
        }
    }
}

/// A single binding's failure during a fan-out write.
#[derive(Debug, thiserror::Error)]
#[error("ssrc {ssrc:#010X} pt {payload_type} seq {sequence_number}: {source}")]
pub struct BindingWriteError {
    /// SSRC stamped for the failed binding.
    pub ssrc: u32,
    /// Payload type stamped for the failed binding.
    pub payload_type: u8,
    /// Sequence number of the packet that could not be written.
    pub sequence_number: u16,
    #[source]
    pub source: Box<Error>,
}

/// Every binding failure collected while fanning a write out.
///
/// Order follows the order bindings were visited, which carries no meaning.
#[derive(Debug, Default)]
pub struct WriteErrors(pub Vec<BindingWriteError>);

impl WriteErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindingWriteError> {
        self.0.iter()
    }

    /// SSRCs of the bindings that failed, deduplicated, in first-seen order.
    pub fn failed_ssrcs(&self) -> Vec<u32> {
        let mut ssrcs: Vec<u32> = Vec::new();
        for e in &self.0 {
            if !ssrcs.contains(&e.ssrc) {
                ssrcs.push(e.ssrc);
            }
        }
        ssrcs
    }

    pub(crate) fn push(&mut self, error: BindingWriteError) {
        self.0.push(error);
    }

    pub(crate) fn append(&mut self, other: WriteErrors) {
        self.0.extend(other.0);
    }

    /// `Ok(())` when nothing failed, otherwise the aggregate error.
    pub(crate) fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::WriteFailed(self))
        }
    }
}

impl fmt::Display for WriteErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
