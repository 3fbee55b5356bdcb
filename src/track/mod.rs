//! Local tracks: media an application sends, fanned out to every
//! connection the track is bound to.
//!
//! When a connection's transport has settled the SSRC and payload type for
//! a track, it calls [`TrackLocal::bind`] with a [`TrackLocalContext`]. The
//! track records a binding (SSRC, payload type, write sink) and from then on
//! every write is restamped and delivered to that sink. [`TrackLocal::unbind`]
//! drops the binding when the transport goes away.
//!
//! Two flavors:
//!
//! - [`TrackLocalStaticRtp`]: the application hands over ready RTP packets.
//! - [`TrackLocalStaticSample`]: the application hands over encoded media
//!   samples; the track packetizes them for its codec.

mod static_rtp;
mod static_sample;

use std::sync::Arc;

pub use static_rtp::TrackLocalStaticRtp;
pub use static_sample::{RTP_OUTBOUND_MTU, Sample, SampleTrackConfig, TrackLocalStaticSample};

use crate::engine::{CodecParameters, MediaKind};
use crate::error::Result;
use crate::media::rtp::Header;

/// Terminal write path for one connection.
///
/// Implementations own send scheduling; a returned error is reported to the
/// writer of the track and never retried here.
pub trait TrackLocalWriter: Send + Sync {
    /// Send one RTP packet, returning the number of bytes written.
    fn write_rtp(&self, header: &Header, payload: &[u8]) -> Result<usize>;
}

/// What a connection's transport hands a track at bind/unbind time.
#[derive(Clone)]
pub struct TrackLocalContext {
    id: String,
    codecs: Vec<CodecParameters>,
    ssrc: u32,
    write_stream: Arc<dyn TrackLocalWriter>,
}

impl TrackLocalContext {
    pub fn new(
        id: &str,
        codecs: Vec<CodecParameters>,
        ssrc: u32,
        write_stream: Arc<dyn TrackLocalWriter>,
    ) -> Self {
        Self {
            id: id.to_string(),
            codecs,
            ssrc,
            write_stream,
        }
    }

    /// Identifies the transceiver this context belongs to.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Codecs negotiated for this connection, in preference order.
    pub fn codec_parameters(&self) -> &[CodecParameters] {
        &self.codecs
    }

    /// SSRC assigned to the track on this connection.
    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn write_stream(&self) -> &Arc<dyn TrackLocalWriter> {
        &self.write_stream
    }
}

impl std::fmt::Debug for TrackLocalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackLocalContext")
            .field("id", &self.id)
            .field("codecs", &self.codecs.len())
            .field("ssrc", &self.ssrc)
            .finish_non_exhaustive()
    }
}

/// A track that can be attached to one or more connections.
pub trait TrackLocal: Send + Sync {
    /// Unique identifier of the track within its stream.
    fn id(&self) -> &str;

    /// Group (media stream) the track belongs to.
    fn stream_id(&self) -> &str;

    /// Audio or video, from the codec's mime type. `None` for other types.
    fn kind(&self) -> Option<MediaKind>;

    /// Attach to a connection. Returns the negotiated codec that was chosen.
    fn bind(&self, ctx: &TrackLocalContext) -> Result<CodecParameters>;

    /// Detach from the connection whose write sink `ctx` carries.
    fn unbind(&self, ctx: &TrackLocalContext) -> Result<()>;
}

/// Sink identity: two handles name the same sink when they share an allocation.
pub(crate) fn same_sink(a: &Arc<dyn TrackLocalWriter>, b: &Arc<dyn TrackLocalWriter>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;
    use crate::engine::codec::CodecCapability;
    use crate::error::Error;

    /// Records every packet it is handed; optionally fails every write.
    #[derive(Default)]
    pub struct RecordingWriter {
        pub packets: Mutex<Vec<(Header, Vec<u8>)>>,
        pub fail: bool,
    }

    impl RecordingWriter {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn headers(&self) -> Vec<Header> {
            self.packets.lock().iter().map(|(h, _)| h.clone()).collect()
        }
    }

    impl TrackLocalWriter for RecordingWriter {
        fn write_rtp(&self, header: &Header, payload: &[u8]) -> Result<usize> {
            if self.fail {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "peer unreachable",
                )));
            }
            self.packets.lock().push((header.clone(), payload.to_vec()));
            Ok(header.marshal_size() + payload.len())
        }
    }

    pub fn codec(mime: &str, clock_rate: u32, payload_type: u8) -> CodecParameters {
        CodecParameters::new(CodecCapability::new(mime, clock_rate, 0, ""), payload_type)
    }

    pub fn context(
        codecs: Vec<CodecParameters>,
        ssrc: u32,
        writer: &Arc<RecordingWriter>,
    ) -> TrackLocalContext {
        TrackLocalContext::new("transceiver", codecs, ssrc, writer.clone())
    }
}
