use super::Payloader;

const NAL_TYPE_MASK: u8 = 0x1f;
const NAL_NRI_MASK: u8 = 0x60;
const NAL_TYPE_AUD: u8 = 9;
const NAL_TYPE_FILLER: u8 = 12;
const NAL_TYPE_FU_A: u8 = 28;
const FU_HEADER_SIZE: usize = 2;

/// H.264 RTP payloader (RFC 6184).
///
/// Converts H.264 Annex B bitstreams into RTP payloads. Supports two
/// packetization modes from RFC 6184:
///
/// - **Single NAL Unit** (§5.6): NALs that fit within the MTU are sent
///   as-is in a single payload.
///
/// - **FU-A Fragmentation** (§5.8): NALs exceeding the MTU are split
///   across multiple payloads. Each fragment carries a 2-byte FU
///   header (FU indicator + FU header) before the NAL payload:
///
///   ```text
///   FU indicator:  [F|NRI|Type=28]     (1 byte)
///   FU header:     [S|E|R|NAL_Type]    (1 byte)
///   Fragment data: [...]               (up to MTU - 2 bytes)
///   ```
///
/// Access unit delimiters and filler data carry nothing a receiver needs
/// and are dropped.
#[derive(Debug, Default, Clone)]
pub struct H264Payloader;

impl H264Payloader {
    pub fn new() -> Self {
        Self
    }

    /// Emit one NAL unit as one or more payloads.
    fn payload_nal(nal_unit: &[u8], mtu: usize, out: &mut Vec<Vec<u8>>) {
        if nal_unit.is_empty() {
            return;
        }

        let nal_type = nal_unit[0] & NAL_TYPE_MASK;
        if nal_type == NAL_TYPE_AUD || nal_type == NAL_TYPE_FILLER {
            return;
        }

        if nal_unit.len() <= mtu {
            out.push(nal_unit.to_vec());
            return;
        }

        // FU-A needs room for the two FU bytes plus at least one data byte.
        if mtu <= FU_HEADER_SIZE {
            tracing::warn!(mtu, nal_size = nal_unit.len(), "MTU too small for FU-A, NAL dropped");
            return;
        }

        let fu_indicator = (nal_unit[0] & NAL_NRI_MASK) | NAL_TYPE_FU_A;
        let payload = &nal_unit[1..];
        let max_fragment = mtu - FU_HEADER_SIZE;
        let before = out.len();

        let mut offset = 0usize;
        while offset < payload.len() {
            let remaining = payload.len() - offset;
            let last_fragment = remaining <= max_fragment;
            let chunk_size = remaining.min(max_fragment);

            // FU header: S=start, E=end, R=0, Type=original NAL type
            let start_bit = if offset == 0 { 0x80 } else { 0x00 };
            let end_bit = if last_fragment { 0x40 } else { 0x00 };

            let mut fragment = Vec::with_capacity(FU_HEADER_SIZE + chunk_size);
            fragment.push(fu_indicator);
            fragment.push(start_bit | end_bit | nal_type);
            fragment.extend_from_slice(&payload[offset..offset + chunk_size]);
            out.push(fragment);

            offset += chunk_size;
        }

        tracing::trace!(
            nal_type,
            nal_size = nal_unit.len(),
            fragments = out.len() - before,
            "FU-A fragmented NAL unit"
        );
    }

    /// Extract NAL units from an H.264 Annex B bitstream.
    ///
    /// Scans for start codes (both 4-byte `00 00 00 01` and 3-byte
    /// `00 00 01`) and returns the NAL data between them, excluding
    /// the start codes themselves.
    ///
    /// The start code length is tracked per-NAL so boundaries between
    /// adjacent NALs are correct when 3-byte and 4-byte start codes mix.
    ///
    /// Data without any start code is taken as a single bare NAL unit.
    pub fn extract_nal_units(data: &[u8]) -> Vec<&[u8]> {
        let mut nal_units = Vec::new();
        let mut i = 0usize;

        // (nal_data_start_index, start_code_length)
        let mut start_entries: Vec<(usize, usize)> = Vec::new();

        while i < data.len() {
            if i + 3 < data.len() && data[i..i + 4] == [0, 0, 0, 1] {
                start_entries.push((i + 4, 4));
                i += 4;
            } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
                start_entries.push((i + 3, 3));
                i += 3;
            } else {
                i += 1;
            }
        }

        if start_entries.is_empty() {
            if !data.is_empty() {
                nal_units.push(data);
            }
            return nal_units;
        }

        for (idx, &(start, _)) in start_entries.iter().enumerate() {
            let end = match start_entries.get(idx + 1) {
                Some(&(next_start, next_sc_len)) => next_start - next_sc_len,
                None => data.len(),
            };

            if start < end {
                nal_units.push(&data[start..end]);
            }
        }

        nal_units
    }
}

impl Payloader for H264Payloader {
    fn payload(&mut self, mtu: usize, data: &[u8]) -> Vec<Vec<u8>> {
        let mut payloads = Vec::new();
        for nal in Self::extract_nal_units(data) {
            Self::payload_nal(nal, mtu, &mut payloads);
        }
        payloads
    }
}
