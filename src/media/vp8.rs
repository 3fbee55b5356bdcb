//! VP8 RTP payloader (RFC 7741).
//!
//! Every payload starts with the 1-byte required payload descriptor:
//!
//! ```text
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |X|R|N|S|R| PID |
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! Only **S** (start of partition) is set, on the first fragment of a
//! frame. No extended control bits, so no picture id.

use super::Payloader;

const DESCRIPTOR_SIZE: usize = 1;
const START_OF_PARTITION: u8 = 0x10;

#[derive(Debug, Default, Clone)]
pub struct Vp8Payloader;

impl Vp8Payloader {
    pub fn new() -> Self {
        Self
    }
}

impl Payloader for Vp8Payloader {
    fn payload(&mut self, mtu: usize, data: &[u8]) -> Vec<Vec<u8>> {
        if data.is_empty() || mtu <= DESCRIPTOR_SIZE {
            return Vec::new();
        }

        data.chunks(mtu - DESCRIPTOR_SIZE)
            .enumerate()
            .map(|(i, chunk)| {
                let mut out = Vec::with_capacity(DESCRIPTOR_SIZE + chunk.len());
                out.push(if i == 0 { START_OF_PARTITION } else { 0 });
                out.extend_from_slice(chunk);
                out
            })
            .collect()
    }
}
