use rand::RngExt;

use super::rtp::{HEADER_LENGTH, Header, Packet};
use super::{CodecPayloader, Payloader};

/// Source of RTP sequence numbers: 16-bit, wrapping.
#[derive(Debug, Clone)]
pub struct Sequencer {
    next: u16,
    roll_over_count: u64,
}

impl Sequencer {
    /// Start at `first`.
    pub fn new(first: u16) -> Self {
        Self {
            next: first,
            roll_over_count: 0,
        }
    }

    /// Start at a random sequence number.
    ///
    /// Per RFC 3550 §5.1, the initial value should be random to make
    /// known-plaintext attacks on encryption more difficult.
    pub fn random() -> Self {
        Self::new(rand::rng().random::<u16>())
    }

    /// Return the current sequence number and advance.
    pub fn next_sequence_number(&mut self) -> u16 {
        let seq = self.next;
        self.next = self.next.wrapping_add(1);
        if self.next == 0 {
            self.roll_over_count += 1;
        }
        seq
    }

    /// Number of times the sequence number has wrapped past `u16::MAX`.
    pub fn roll_over_count(&self) -> u64 {
        self.roll_over_count
    }
}

/// Turns media samples into RTP packets for one codec.
///
/// Owns sequence/timestamp continuity across calls. All packets of one
/// sample share a timestamp; the marker bit is set on the last one. The
/// timestamp advances by the sample's tick count after it is packetized.
///
/// `payload_type` and `ssrc` are placeholders when the packetizer feeds a
/// track: each binding restamps them before writing.
#[derive(Debug)]
pub struct Packetizer {
    mtu: usize,
    payload_type: u8,
    ssrc: u32,
    payloader: CodecPayloader,
    sequencer: Sequencer,
    clock_rate: u32,
    timestamp: u32,
}

impl Packetizer {
    /// Create a packetizer with a random initial timestamp.
    pub fn new(
        mtu: usize,
        payload_type: u8,
        ssrc: u32,
        payloader: CodecPayloader,
        sequencer: Sequencer,
        clock_rate: u32,
    ) -> Self {
        Self::with_timestamp(
            mtu,
            payload_type,
            ssrc,
            payloader,
            sequencer,
            clock_rate,
            rand::rng().random::<u32>(),
        )
    }

    pub fn with_timestamp(
        mtu: usize,
        payload_type: u8,
        ssrc: u32,
        payloader: CodecPayloader,
        sequencer: Sequencer,
        clock_rate: u32,
        timestamp: u32,
    ) -> Self {
        tracing::debug!(
            mtu,
            clock_rate,
            payloader = payloader.name(),
            "packetizer created"
        );
        Self {
            mtu,
            payload_type,
            ssrc,
            payloader,
            sequencer,
            clock_rate,
            timestamp,
        }
    }

    /// Packetize one media unit, then advance the timestamp by `samples` ticks.
    ///
    /// An empty unit produces no packets and leaves the timestamp alone.
    pub fn packetize(&mut self, payload: &[u8], samples: u32) -> Vec<Packet> {
        if payload.is_empty() {
            return Vec::new();
        }

        let payloads = self
            .payloader
            .payload(self.mtu.saturating_sub(HEADER_LENGTH), payload);
        let last = payloads.len().saturating_sub(1);

        let packets: Vec<Packet> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| Packet {
                header: Header {
                    marker: i == last,
                    payload_type: self.payload_type,
                    sequence_number: self.sequencer.next_sequence_number(),
                    timestamp: self.timestamp,
                    ssrc: self.ssrc,
                    ..Default::default()
                },
                payload,
            })
            .collect();

        tracing::trace!(
            rtp_packets = packets.len(),
            sample_bytes = payload.len(),
            ts = self.timestamp,
            samples,
            "sample packetized"
        );

        self.timestamp = self.timestamp.wrapping_add(samples);
        packets
    }

    /// RTP clock rate in Hz.
    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    /// Timestamp the next sample will carry.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }
}
