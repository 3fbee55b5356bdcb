use super::Payloader;

/// Payloader for sample-based narrowband codecs: G.711 (PCMU/PCMA) and
/// G.722 (RFC 3551 §4.5).
///
/// Samples are independent octets, so a frame is simply cut into
/// MTU-sized chunks with no payload header.
#[derive(Debug, Default, Clone)]
pub struct G7xxPayloader;

impl G7xxPayloader {
    pub fn new() -> Self {
        Self
    }
}

impl Payloader for G7xxPayloader {
    fn payload(&mut self, mtu: usize, data: &[u8]) -> Vec<Vec<u8>> {
        if data.is_empty() || mtu == 0 {
            return Vec::new();
        }
        data.chunks(mtu).map(<[u8]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_at_mtu() {
        let mut p = G7xxPayloader::new();
        let payloads = p.payload(160, &[0xFF; 400]);
        let sizes: Vec<usize> = payloads.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![160, 160, 80]);
    }

    #[test]
    fn small_frame_unchanged() {
        let mut p = G7xxPayloader::new();
        assert_eq!(p.payload(1200, &[1, 2, 3]), vec![vec![1, 2, 3]]);
    }
}
