//! VP9 RTP payloader (RFC 9628), flexible mode.
//!
//! Each payload carries a 3-byte descriptor:
//!
//! ```text
//!  0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+
//! |I|P|L|F|B|E|V|Z|   I=1 (picture id present), F=1 (flexible mode)
//! +-+-+-+-+-+-+-+-+
//! |M| PICTURE ID  |   M=1 (15-bit picture id)
//! +-+-+-+-+-+-+-+-+
//! |   PICTURE ID  |
//! +-+-+-+-+-+-+-+-+
//! ```
//!
//! **B** marks the first fragment of a frame and **E** the last. The picture
//! id starts at a random value and advances once per frame.

use rand::RngExt;

use super::Payloader;

const DESCRIPTOR_SIZE: usize = 3;
const FLAG_I: u8 = 0x80;
const FLAG_F: u8 = 0x10;
const FLAG_B: u8 = 0x08;
const FLAG_E: u8 = 0x04;
const FLAG_M: u8 = 0x80;
const PICTURE_ID_MASK: u16 = 0x7fff;

#[derive(Debug, Clone)]
pub struct Vp9Payloader {
    picture_id: u16,
}

impl Vp9Payloader {
    pub fn new() -> Self {
        Self::with_picture_id(rand::rng().random::<u16>())
    }

    pub fn with_picture_id(picture_id: u16) -> Self {
        Self {
            picture_id: picture_id & PICTURE_ID_MASK,
        }
    }

    /// Picture id the next frame will carry.
    pub fn picture_id(&self) -> u16 {
        self.picture_id
    }
}

impl Default for Vp9Payloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Payloader for Vp9Payloader {
    fn payload(&mut self, mtu: usize, data: &[u8]) -> Vec<Vec<u8>> {
        if data.is_empty() || mtu <= DESCRIPTOR_SIZE {
            return Vec::new();
        }

        let chunks: Vec<&[u8]> = data.chunks(mtu - DESCRIPTOR_SIZE).collect();
        let last = chunks.len() - 1;
        let payloads = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let mut flags = FLAG_I | FLAG_F;
                if i == 0 {
                    flags |= FLAG_B;
                }
                if i == last {
                    flags |= FLAG_E;
                }

                let mut out = Vec::with_capacity(DESCRIPTOR_SIZE + chunk.len());
                out.push(flags);
                out.push(FLAG_M | (self.picture_id >> 8) as u8);
                out.push(self.picture_id as u8);
                out.extend_from_slice(chunk);
                out
            })
            .collect();

        self.picture_id = self.picture_id.wrapping_add(1) & PICTURE_ID_MASK;
        payloads
    }
}
