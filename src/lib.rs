pub mod engine;
pub mod error;
pub mod media;
pub mod sdp;
pub mod track;

pub use engine::{
    CodecCapability, CodecParameters, HeaderExtension, MediaEngine, MediaKind, RtcpFeedback,
};
pub use error::{Error, Result};
pub use media::rtp::{Header, Packet};
pub use track::{
    Sample, SampleTrackConfig, TrackLocal, TrackLocalContext, TrackLocalStaticRtp,
    TrackLocalStaticSample, TrackLocalWriter,
};
