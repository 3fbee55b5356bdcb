use std::sync::Arc;

use parking_lot::RwLock;

use super::{TrackLocal, TrackLocalContext, TrackLocalWriter, same_sink};
use crate::engine::{CodecCapability, CodecParameters, MediaKind};
use crate::error::{BindingWriteError, Error, Result, WriteErrors};
use crate::media::rtp::Packet;

/// One connection the track currently feeds.
#[derive(Clone)]
struct TrackBinding {
    ssrc: u32,
    payload_type: u8,
    write_stream: Arc<dyn TrackLocalWriter>,
}

/// A track the application writes ready-made RTP packets to.
///
/// Every packet is copied to each binding with that binding's SSRC and
/// payload type stamped in; the rest of the header (sequence number,
/// timestamp, marker, extensions) passes through unchanged.
///
/// Binding order carries no meaning: unbinding swaps the last binding into
/// the removed slot.
pub struct TrackLocalStaticRtp {
    bindings: RwLock<Vec<TrackBinding>>,
    codec: CodecCapability,
    id: String,
    stream_id: String,
}

impl TrackLocalStaticRtp {
    pub fn new(codec: CodecCapability, id: &str, stream_id: &str) -> Self {
        Self {
            bindings: RwLock::new(Vec::new()),
            codec,
            id: id.to_string(),
            stream_id: stream_id.to_string(),
        }
    }

    /// The codec this track carries. Fixed for the track's lifetime.
    pub fn codec(&self) -> &CodecCapability {
        &self.codec
    }

    /// Number of connections currently bound.
    pub fn binding_count(&self) -> usize {
        self.bindings.read().len()
    }

    /// Write a packet to every binding.
    ///
    /// Delivery continues past failing bindings. Succeeds only if every
    /// binding accepted the packet; otherwise the error lists each failure.
    pub fn write_rtp(&self, packet: &Packet) -> Result<()> {
        self.fan_out(packet).into_result()
    }

    /// Decode `raw` as an RTP packet and [`write_rtp`](Self::write_rtp) it.
    ///
    /// Returns `raw.len()` on success.
    pub fn write(&self, raw: &[u8]) -> Result<usize> {
        let packet = Packet::unmarshal(raw)?;
        self.write_rtp(&packet)?;
        Ok(raw.len())
    }

    /// Deliver `packet` to a snapshot of the current bindings, collecting
    /// failures instead of stopping at the first one.
    pub(crate) fn fan_out(&self, packet: &Packet) -> WriteErrors {
        let bindings = self.bindings.read().clone();
        let mut errors = WriteErrors::default();

        for binding in &bindings {
            let mut header = packet.header.clone();
            header.ssrc = binding.ssrc;
            header.payload_type = binding.payload_type;

            match binding.write_stream.write_rtp(&header, &packet.payload) {
                Ok(n) => tracing::trace!(
                    ssrc = header.ssrc,
                    pt = header.payload_type,
                    seq = header.sequence_number,
                    bytes = n,
                    "rtp written"
                ),
                Err(e) => {
                    tracing::warn!(
                        ssrc = header.ssrc,
                        pt = header.payload_type,
                        seq = header.sequence_number,
                        error = %e,
                        "rtp write failed"
                    );
                    errors.push(BindingWriteError {
                        ssrc: header.ssrc,
                        payload_type: header.payload_type,
                        sequence_number: header.sequence_number,
                        source: Box::new(e),
                    });
                }
            }
        }

        errors
    }
}

impl TrackLocal for TrackLocalStaticRtp {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream_id(&self) -> &str {
        &self.stream_id
    }

    fn kind(&self) -> Option<MediaKind> {
        self.codec.kind()
    }

    /// Bind to the first negotiated codec whose mime type matches the
    /// track's. Binding again with the same write sink replaces that
    /// binding instead of adding a second one.
    fn bind(&self, ctx: &TrackLocalContext) -> Result<CodecParameters> {
        let codec = ctx
            .codec_parameters()
            .iter()
            .find(|c| c.mime_type().eq_ignore_ascii_case(&self.codec.mime_type))
            .cloned()
            .ok_or_else(|| Error::UnsupportedCodec(self.codec.mime_type.clone()))?;

        let binding = TrackBinding {
            ssrc: ctx.ssrc(),
            payload_type: codec.payload_type,
            write_stream: ctx.write_stream().clone(),
        };

        let mut bindings = self.bindings.write();
        match bindings
            .iter_mut()
            .find(|b| same_sink(&b.write_stream, ctx.write_stream()))
        {
            Some(existing) => {
                *existing = binding;
                tracing::debug!(
                    track = %self.id,
                    ssrc = ctx.ssrc(),
                    pt = codec.payload_type,
                    "binding replaced"
                );
            }
            None => {
                bindings.push(binding);
                tracing::debug!(
                    track = %self.id,
                    ssrc = ctx.ssrc(),
                    pt = codec.payload_type,
                    bindings = bindings.len(),
                    "track bound"
                );
            }
        }

        Ok(codec)
    }

    fn unbind(&self, ctx: &TrackLocalContext) -> Result<()> {
        let mut bindings = self.bindings.write();
        let pos = bindings
            .iter()
            .position(|b| same_sink(&b.write_stream, ctx.write_stream()))
            .ok_or(Error::UnbindFailed)?;
        let removed = bindings.swap_remove(pos);
        tracing::debug!(
            track = %self.id,
            ssrc = removed.ssrc,
            bindings = bindings.len(),
            "track unbound"
        );
        Ok(())
    }
}
