use super::Payloader;

/// Opus RTP payloader (RFC 7587).
///
/// An Opus frame is never fragmented: the whole frame is one payload,
/// regardless of MTU.
#[derive(Debug, Default, Clone)]
pub struct OpusPayloader;

impl OpusPayloader {
    pub fn new() -> Self {
        Self
    }
}

impl Payloader for OpusPayloader {
    fn payload(&mut self, _mtu: usize, data: &[u8]) -> Vec<Vec<u8>> {
        if data.is_empty() {
            return Vec::new();
        }
        vec![data.to_vec()]
    }
}
