use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use super::{TrackLocal, TrackLocalContext, TrackLocalStaticRtp};
use crate::engine::{CodecCapability, CodecParameters, MediaKind};
use crate::error::{Error, Result, WriteErrors};
use crate::media::{CodecPayloader, Packetizer, Sequencer};

/// Packet-size ceiling for outbound RTP, header included.
///
/// Leaves headroom under a 1500-byte Ethernet MTU for IP/UDP, SRTP and
/// TURN overhead.
pub const RTP_OUTBOUND_MTU: usize = 1200;

/// Sample track configuration.
#[derive(Debug, Clone)]
pub struct SampleTrackConfig {
    /// Ceiling for each outgoing RTP packet, header included.
    pub mtu: usize,
}

impl Default for SampleTrackConfig {
    fn default() -> Self {
        Self {
            mtu: RTP_OUTBOUND_MTU,
        }
    }
}

/// One encoded media unit (a video frame, an audio frame).
#[derive(Debug, Clone, Default)]
pub struct Sample {
    pub data: Vec<u8>,
    /// Playout duration; advances the RTP timestamp after this sample.
    pub duration: Duration,
}

/// A track the application writes encoded media samples to.
///
/// Wraps a [`TrackLocalStaticRtp`]; its packetizer is created on bind, for
/// the track's codec. Samples written before the first successful bind are
/// dropped.
pub struct TrackLocalStaticSample {
    rtp_track: TrackLocalStaticRtp,
    packetizer: ArcSwapOption<Mutex<Packetizer>>,
    config: SampleTrackConfig,
}

impl TrackLocalStaticSample {
    pub fn new(codec: CodecCapability, id: &str, stream_id: &str) -> Self {
        Self::with_config(codec, id, stream_id, SampleTrackConfig::default())
    }

    pub fn with_config(
        codec: CodecCapability,
        id: &str,
        stream_id: &str,
        config: SampleTrackConfig,
    ) -> Self {
        Self {
            rtp_track: TrackLocalStaticRtp::new(codec, id, stream_id),
            packetizer: ArcSwapOption::empty(),
            config,
        }
    }

    pub fn codec(&self) -> &CodecCapability {
        self.rtp_track.codec()
    }

    pub fn binding_count(&self) -> usize {
        self.rtp_track.binding_count()
    }

    /// Packetize `sample` and write every packet to every binding.
    ///
    /// A no-op before the first successful bind. Failures are collected
    /// across all packets and bindings and reported together.
    pub fn write_sample(&self, sample: &Sample) -> Result<()> {
        let Some(packetizer) = self.packetizer.load_full() else {
            tracing::trace!(track = self.rtp_track.id(), "sample dropped, track not bound");
            return Ok(());
        };

        let packets = {
            let mut packetizer = packetizer.lock();
            let samples = duration_to_ticks(sample.duration, packetizer.clock_rate());
            packetizer.packetize(&sample.data, samples)
        };

        let mut errors = WriteErrors::default();
        for packet in &packets {
            errors.append(self.rtp_track.fan_out(packet));
        }
        errors.into_result()
    }
}

/// Duration in RTP clock ticks, rounded to the nearest tick.
fn duration_to_ticks(duration: Duration, clock_rate: u32) -> u32 {
    (duration.as_secs_f64() * f64::from(clock_rate)).round() as u32
}

impl TrackLocal for TrackLocalStaticSample {
    fn id(&self) -> &str {
        self.rtp_track.id()
    }

    fn stream_id(&self) -> &str {
        self.rtp_track.stream_id()
    }

    fn kind(&self) -> Option<MediaKind> {
        self.rtp_track.kind()
    }

    /// Bind the wrapped track, then install a fresh packetizer for the
    /// track's codec. The last successful bind's packetizer wins.
    ///
    /// If the codec has no payloader, the binding just made is removed
    /// again and the current packetizer is left in place.
    fn bind(&self, ctx: &TrackLocalContext) -> Result<CodecParameters> {
        let codec = self.rtp_track.bind(ctx)?;

        let Some(payloader) = CodecPayloader::for_mime_type(codec.mime_type()) else {
            // A concurrent unbind may already have removed the binding.
            match self.rtp_track.unbind(ctx) {
                Ok(()) | Err(Error::UnbindFailed) => {}
                Err(e) => return Err(e),
            }
            return Err(Error::NoPayloaderForCodec(codec.mime_type().to_string()));
        };

        let packetizer = Packetizer::new(
            self.config.mtu,
            0, // restamped per binding
            0,
            payloader,
            Sequencer::random(),
            self.rtp_track.codec().clock_rate,
        );
        self.packetizer.store(Some(Arc::new(Mutex::new(packetizer))));
        tracing::debug!(
            track = self.rtp_track.id(),
            mime_type = codec.mime_type(),
            mtu = self.config.mtu,
            "packetizer installed"
        );

        Ok(codec)
    }

    fn unbind(&self, ctx: &TrackLocalContext) -> Result<()> {
        self.rtp_track.unbind(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::engine::codec::{MIME_TYPE_H264, MIME_TYPE_OPUS, MIME_TYPE_VP8};

    fn opus_track() -> TrackLocalStaticSample {
        TrackLocalStaticSample::new(
            CodecCapability::new(MIME_TYPE_OPUS, 48000, 2, ""),
            "audio",
            "mic",
        )
    }

    fn opus_sample() -> Sample {
        Sample {
            data: vec![0xfc; 80],
            duration: Duration::from_millis(20),
        }
    }

    fn timestamp(track: &TrackLocalStaticSample) -> Option<u32> {
        track.packetizer.load_full().map(|p| p.lock().timestamp())
    }

    #[test]
    fn identity_delegates() {
        let track = opus_track();
        assert_eq!(track.id(), "audio");
        assert_eq!(track.stream_id(), "mic");
        assert_eq!(track.kind(), Some(MediaKind::Audio));
        assert_eq!(track.codec().mime_type, MIME_TYPE_OPUS);
    }

    #[test]
    fn write_before_bind_is_noop() {
        let track = opus_track();
        assert!(track.write_sample(&opus_sample()).is_ok());
        assert!(timestamp(&track).is_none());
    }

    #[test]
    fn duration_math() {
        assert_eq!(duration_to_ticks(Duration::from_millis(20), 48000), 960);
        assert_eq!(duration_to_ticks(Duration::from_secs_f64(1.0 / 30.0), 90000), 3000);
        assert_eq!(duration_to_ticks(Duration::from_micros(10), 8000), 0);
        assert_eq!(duration_to_ticks(Duration::ZERO, 90000), 0);
    }

    #[test]
    fn write_advances_timestamp_by_duration() {
        let track = opus_track();
        let w = Arc::new(RecordingWriter::default());
        track
            .bind(&context(vec![codec(MIME_TYPE_OPUS, 48000, 111)], 1, &w))
            .unwrap();

        let before = timestamp(&track).unwrap();
        track.write_sample(&opus_sample()).unwrap();
        assert_eq!(timestamp(&track).unwrap(), before.wrapping_add(960));

        let headers = w.headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].timestamp, before);
        assert_eq!(headers[0].payload_type, 111);
        assert!(headers[0].marker);
    }

    #[test]
    fn sequence_continues_across_samples() {
        let track = opus_track();
        let w = Arc::new(RecordingWriter::default());
        track
            .bind(&context(vec![codec(MIME_TYPE_OPUS, 48000, 111)], 1, &w))
            .unwrap();

        track.write_sample(&opus_sample()).unwrap();
        track.write_sample(&opus_sample()).unwrap();
        let headers = w.headers();
        assert_eq!(
            headers[1].sequence_number,
            headers[0].sequence_number.wrapping_add(1)
        );
    }

    #[test]
    fn fragments_to_configured_mtu() {
        let track = TrackLocalStaticSample::with_config(
            CodecCapability::new(MIME_TYPE_VP8, 90000, 0, ""),
            "video",
            "camera",
            SampleTrackConfig { mtu: 112 },
        );
        let w = Arc::new(RecordingWriter::default());
        track
            .bind(&context(vec![codec(MIME_TYPE_VP8, 90000, 96)], 1, &w))
            .unwrap();

        track
            .write_sample(&Sample {
                data: vec![1; 250],
                duration: Duration::from_millis(33),
            })
            .unwrap();

        let packets = w.packets.lock();
        assert!(packets.len() > 1);
        assert!(packets.iter().all(|(_, p)| p.len() <= 100));
        assert!(packets.iter().all(|(h, _)| h.timestamp == packets[0].0.timestamp));
        assert!(packets.last().unwrap().0.marker);
        assert!(!packets[0].0.marker);
    }

    #[test]
    fn fan_out_failure_reports_each_packet() {
        let track = TrackLocalStaticSample::with_config(
            CodecCapability::new(MIME_TYPE_VP8, 90000, 0, ""),
            "video",
            "camera",
            SampleTrackConfig { mtu: 112 },
        );
        let ok1 = Arc::new(RecordingWriter::default());
        let bad = Arc::new(RecordingWriter::failing());
        let ok2 = Arc::new(RecordingWriter::default());
        for (ssrc, w) in [(1, &ok1), (2, &bad), (3, &ok2)] {
            track
                .bind(&context(vec![codec(MIME_TYPE_VP8, 90000, 96)], ssrc, w))
                .unwrap();
        }

        let err = track
            .write_sample(&Sample {
                data: vec![1; 250],
                duration: Duration::from_millis(33),
            })
            .unwrap_err();
        let Error::WriteFailed(errors) = err else {
            panic!("expected WriteFailed, got {err:?}");
        };

        let sent = ok1.headers().len();
        assert_eq!(ok2.headers().len(), sent);
        assert_eq!(errors.len(), sent);
        assert_eq!(errors.failed_ssrcs(), vec![2]);
    }

    #[test]
    fn clock_rate_comes_from_track_codec() {
        let track = opus_track();
        let w = Arc::new(RecordingWriter::default());
        // Bind matches on mime type only; the offered clock rate is ignored.
        track
            .bind(&context(vec![codec(MIME_TYPE_OPUS, 90000, 111)], 1, &w))
            .unwrap();

        let before = timestamp(&track).unwrap();
        track.write_sample(&opus_sample()).unwrap();
        assert_eq!(timestamp(&track).unwrap(), before.wrapping_add(960));
    }

    #[test]
    fn h264_sample_without_start_code_is_delivered() {
        let track = TrackLocalStaticSample::new(
            CodecCapability::new(MIME_TYPE_H264, 90000, 0, ""),
            "video",
            "camera",
        );
        let w = Arc::new(RecordingWriter::default());
        track
            .bind(&context(vec![codec(MIME_TYPE_H264, 90000, 102)], 1, &w))
            .unwrap();

        track
            .write_sample(&Sample {
                data: vec![0x65, 0x88, 0x84, 0x00, 0x10],
                duration: Duration::from_millis(33),
            })
            .unwrap();

        let packets = w.packets.lock();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].1, vec![0x65, 0x88, 0x84, 0x00, 0x10]);
    }

    #[test]
    fn no_payloader_error_survives_missing_binding() {
        let track = TrackLocalStaticSample::new(
            CodecCapability::new("video/AV1", 90000, 0, ""),
            "video",
            "camera",
        );
        let w = Arc::new(RecordingWriter::default());
        let ctx = context(vec![codec("video/AV1", 90000, 45)], 1, &w);

        // Racing unbinds: the rollback finds the binding already gone.
        let shared = Arc::new(track);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let track = shared.clone();
                let ctx = ctx.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _ = track.unbind(&ctx);
                    }
                })
            })
            .collect();
        for _ in 0..100 {
            let err = shared.bind(&ctx).unwrap_err();
            assert!(matches!(err, Error::NoPayloaderForCodec(_)), "{err:?}");
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(shared.binding_count(), 0);
    }

    #[test]
    fn no_payloader_rolls_back_bind() {
        let track = TrackLocalStaticSample::new(
            CodecCapability::new("video/AV1", 90000, 0, ""),
            "video",
            "camera",
        );
        let w = Arc::new(RecordingWriter::default());
        let err = track
            .bind(&context(vec![codec("video/AV1", 90000, 45)], 1, &w))
            .unwrap_err();

        assert!(matches!(err, Error::NoPayloaderForCodec(m) if m == "video/AV1"));
        assert_eq!(track.binding_count(), 0);
        assert!(timestamp(&track).is_none());
    }

    #[test]
    fn unsupported_codec_propagates_from_raw_bind() {
        let track = opus_track();
        let w = Arc::new(RecordingWriter::default());
        let err = track
            .bind(&context(vec![codec(MIME_TYPE_H264, 90000, 102)], 1, &w))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCodec(_)));
        assert_eq!(track.binding_count(), 0);
    }

    #[test]
    fn rebind_replaces_packetizer() {
        let track = opus_track();
        let w1 = Arc::new(RecordingWriter::default());
        let w2 = Arc::new(RecordingWriter::default());
        track
            .bind(&context(vec![codec(MIME_TYPE_OPUS, 48000, 111)], 1, &w1))
            .unwrap();
        let first = track.packetizer.load_full().unwrap();
        track
            .bind(&context(vec![codec(MIME_TYPE_OPUS, 48000, 111)], 2, &w2))
            .unwrap();
        let second = track.packetizer.load_full().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(track.binding_count(), 2);
    }

    #[test]
    fn bind_unbind_restores_size() {
        let track = opus_track();
        let w = Arc::new(RecordingWriter::default());
        let ctx = context(vec![codec(MIME_TYPE_OPUS, 48000, 111)], 1, &w);
        track.bind(&ctx).unwrap();
        track.unbind(&ctx).unwrap();
        assert_eq!(track.binding_count(), 0);
        assert!(matches!(track.unbind(&ctx), Err(Error::UnbindFailed)));
    }

    #[test]
    fn concurrent_writes_and_rebinds() {
        use std::thread;

        let track = Arc::new(opus_track());
        let w = Arc::new(RecordingWriter::default());
        track
            .bind(&context(vec![codec(MIME_TYPE_OPUS, 48000, 111)], 1, &w))
            .unwrap();

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let track = track.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        track.write_sample(&opus_sample()).unwrap();
                    }
                })
            })
            .collect();
        let rebinder = {
            let track = track.clone();
            let w = w.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    track
                        .bind(&context(vec![codec(MIME_TYPE_OPUS, 48000, 111)], 1, &w))
                        .unwrap();
                }
            })
        };
        for h in writers {
            h.join().unwrap();
        }
        rebinder.join().unwrap();

        assert_eq!(track.binding_count(), 1);
        assert_eq!(w.headers().len(), 200);
    }
}
