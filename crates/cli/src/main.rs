use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use rtc::track::RTP_OUTBOUND_MTU;
use rtc::{
    Error, Header, MediaEngine, MediaKind, Sample, SampleTrackConfig, TrackLocal,
    TrackLocalContext, TrackLocalStaticSample, TrackLocalWriter,
};

#[derive(Parser)]
#[command(
    name = "rtc",
    about = "Inspect the default codec catalog and packetize media into RTP"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the default codecs and header extensions
    Codecs {
        /// Only this kind (audio or video)
        #[arg(long)]
        kind: Option<MediaKind>,
    },
    /// Packetize a file as a stream of equal-sized samples
    Packetize {
        /// Codec mime type, e.g. video/VP8
        #[arg(long)]
        mime: String,
        /// Encoded media to read
        #[arg(long)]
        input: PathBuf,
        /// Bytes per sample
        #[arg(long, default_value_t = 1000)]
        chunk_size: usize,
        /// Duration of each sample in milliseconds
        #[arg(long, default_value_t = 20)]
        duration_ms: u64,
        /// RTP packet size ceiling
        #[arg(long, default_value_t = RTP_OUTBOUND_MTU)]
        mtu: usize,
    },
}

/// Write sink that only counts what it is handed.
#[derive(Default)]
struct CountingWriter {
    packets: AtomicUsize,
    bytes: AtomicUsize,
}

impl TrackLocalWriter for CountingWriter {
    fn write_rtp(&self, header: &Header, payload: &[u8]) -> rtc::Result<usize> {
        let n = header.marshal_size() + payload.len();
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(n, Ordering::Relaxed);
        Ok(n)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let result = match args.command {
        Command::Codecs { kind } => {
            list_codecs(kind);
            Ok(())
        }
        Command::Packetize {
            mime,
            input,
            chunk_size,
            duration_ms,
            mtu,
        } => packetize(&mime, &input, chunk_size, Duration::from_millis(duration_ms), mtu),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn default_engine() -> MediaEngine {
    let mut engine = MediaEngine::new();
    engine.register_default_codecs();
    engine
}

fn list_codecs(kind: Option<MediaKind>) {
    let engine = default_engine();
    let kinds = match kind {
        Some(k) => vec![k],
        None => vec![MediaKind::Audio, MediaKind::Video],
    };

    for kind in kinds {
        println!("{kind}:");
        for codec in engine.codecs_by_kind(kind) {
            let cap = &codec.capability;
            print!("  {:>3} {}/{}", codec.payload_type, cap.mime_type, cap.clock_rate);
            if cap.channels > 0 {
                print!("/{}", cap.channels);
            }
            if !cap.sdp_fmtp_line.is_empty() {
                print!("  {}", cap.sdp_fmtp_line);
            }
            println!();
        }
        for ext in engine.negotiated_header_extensions_for_kind(kind) {
            println!("  ext {:>2} {}", ext.id, ext.uri);
        }
    }
}

fn packetize(
    mime: &str,
    input: &Path,
    chunk_size: usize,
    duration: Duration,
    mtu: usize,
) -> rtc::Result<()> {
    let engine = default_engine();
    let kind = MediaKind::from_mime_type(mime)
        .ok_or_else(|| Error::UnknownMediaKind(mime.to_string()))?;
    let codec = engine
        .codecs_by_kind(kind)
        .into_iter()
        .find(|c| c.mime_type().eq_ignore_ascii_case(mime))
        .ok_or_else(|| Error::UnsupportedCodec(mime.to_string()))?;

    let track = TrackLocalStaticSample::with_config(
        codec.capability.clone(),
        "cli",
        "cli",
        SampleTrackConfig { mtu },
    );
    let writer = Arc::new(CountingWriter::default());
    let ctx = TrackLocalContext::new(
        "cli",
        engine.negotiated_codecs_for_kind(kind),
        0x1234_5678,
        writer.clone(),
    );
    let bound = track.bind(&ctx)?;
    tracing::info!(mime_type = bound.mime_type(), pt = bound.payload_type, mtu, "track bound");

    let data = std::fs::read(input)?;
    let mut samples = 0usize;
    for chunk in data.chunks(chunk_size.max(1)) {
        track.write_sample(&Sample {
            data: chunk.to_vec(),
            duration,
        })?;
        samples += 1;
    }

    println!(
        "{} bytes in {} samples -> {} packets, {} bytes on the wire",
        data.len(),
        samples,
        writer.packets.load(Ordering::Relaxed),
        writer.bytes.load(Ordering::Relaxed),
    );
    Ok(())
}
