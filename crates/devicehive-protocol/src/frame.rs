//! Length-and-checksum-delimited binary frame codecs.
//!
//! Two concrete frame shapes are supported: [`SimpleFrame`], a compact
//! single-byte-length format used by the reference gateway protocol, and
//! [`XBeeFrame`], matching the Digi XBee API frame format. Both share the
//! same parse/format contract via the [`Frame`] trait.

/// Result of attempting to parse one frame out of a byte buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome<F> {
    /// A complete, checksum-valid frame was found.
    Success { frame: F, consumed: usize },
    /// Not enough bytes are buffered yet to know the outcome. `consumed`
    /// counts leading bytes the caller may drop immediately without losing
    /// any possible frame — bytes scanned before the signature (or the
    /// whole buffer, if no signature byte is present at all). The caller
    /// should drain `consumed` bytes and keep the remainder buffered.
    Incomplete { consumed: usize },
    /// A frame header was found but its checksum did not match. The caller
    /// should drop `skip` bytes and resume scanning — this is the resync
    /// policy, and it is always exactly one byte (the signature), so a
    /// corrupted length field can't cause the scanner to skip a real frame.
    BadChecksum { skip: usize },
}

/// A codec for one binary frame format.
///
/// `parse` scans from the start of `buf` for a frame; it never assumes `buf`
/// begins on a signature byte, since stray bytes can precede a resynced
/// stream.
pub trait Frame: Sized {
    fn parse(buf: &[u8]) -> ParseOutcome<Self>;
    fn format(&self) -> Vec<u8>;
}

fn find_signature(buf: &[u8], signature: u8) -> Option<usize> {
    buf.iter().position(|&b| b == signature)
}

/// Compact frame: `signature(1) length(1) intent(2 LE) payload(length) checksum(1)`.
///
/// Checksum is `0xFF - (sum of signature..last payload byte, mod 256)`,
/// computed over the header plus payload (everything but the checksum byte
/// itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleFrame {
    pub intent: u16,
    pub payload: Vec<u8>,
}

impl SimpleFrame {
    pub const SIGNATURE: u8 = 0xFC;
    const HEADER_LEN: usize = 4; // signature + length + intent
    const FOOTER_LEN: usize = 1; // checksum

    fn checksum(bytes: &[u8]) -> u8 {
        let sum: u32 = bytes.iter().map(|&b| b as u32).sum();
        0xFFu8.wrapping_sub((sum % 256) as u8)
    }
}

impl Frame for SimpleFrame {
    fn parse(buf: &[u8]) -> ParseOutcome<Self> {
        let Some(sig_pos) = find_signature(buf, Self::SIGNATURE) else {
            return ParseOutcome::Incomplete { consumed: buf.len() };
        };
        let rest = &buf[sig_pos..];
        if rest.len() < Self::HEADER_LEN {
            return ParseOutcome::Incomplete { consumed: sig_pos };
        }
        let length = rest[1] as usize;
        let total_len = Self::HEADER_LEN + length + Self::FOOTER_LEN;
        if rest.len() < total_len {
            return ParseOutcome::Incomplete { consumed: sig_pos };
        }
        let body = &rest[..Self::HEADER_LEN + length];
        let checksum_byte = rest[Self::HEADER_LEN + length];
        if Self::checksum(body) != checksum_byte {
            return ParseOutcome::BadChecksum { skip: 1 };
        }
        let intent = u16::from_le_bytes([rest[2], rest[3]]);
        let payload = rest[Self::HEADER_LEN..Self::HEADER_LEN + length].to_vec();
        ParseOutcome::Success {
            frame: SimpleFrame { intent, payload },
            consumed: sig_pos + total_len,
        }
    }

    fn format(&self) -> Vec<u8> {
        assert!(self.payload.len() <= u8::MAX as usize, "payload too large for simple frame");
        let mut out = Vec::with_capacity(Self::HEADER_LEN + self.payload.len() + Self::FOOTER_LEN);
        out.push(Self::SIGNATURE);
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.intent.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out.push(Self::checksum(&out));
        out
    }
}

/// XBee API frame: `signature(1) length(2 BE) payload(length) checksum(1)`.
///
/// Checksum covers the payload only: `0xFF - (sum of payload bytes, mod 256)`.
/// The payload's own leading type byte distinguishes which [`crate::payload::XbeePayload`]
/// variant it carries — there is no separate intent field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XBeeFrame {
    pub payload: Vec<u8>,
}

impl XBeeFrame {
    pub const SIGNATURE: u8 = 0x7E;
    const HEADER_LEN: usize = 3; // signature + 2-byte length
    const FOOTER_LEN: usize = 1;

    fn checksum(payload: &[u8]) -> u8 {
        let sum: u32 = payload.iter().map(|&b| b as u32).sum();
        0xFFu8.wrapping_sub((sum % 256) as u8)
    }
}

impl Frame for XBeeFrame {
    fn parse(buf: &[u8]) -> ParseOutcome<Self> {
        let Some(sig_pos) = find_signature(buf, Self::SIGNATURE) else {
            return ParseOutcome::Incomplete { consumed: buf.len() };
        };
        let rest = &buf[sig_pos..];
        if rest.len() < Self::HEADER_LEN {
            return ParseOutcome::Incomplete { consumed: sig_pos };
        }
        let length = u16::from_be_bytes([rest[1], rest[2]]) as usize;
        let total_len = Self::HEADER_LEN + length + Self::FOOTER_LEN;
        if rest.len() < total_len {
            return ParseOutcome::Incomplete { consumed: sig_pos };
        }
        let payload = &rest[Self::HEADER_LEN..Self::HEADER_LEN + length];
        let checksum_byte = rest[Self::HEADER_LEN + length];
        if Self::checksum(payload) != checksum_byte {
            return ParseOutcome::BadChecksum { skip: 1 };
        }
        ParseOutcome::Success {
            frame: XBeeFrame { payload: payload.to_vec() },
            consumed: sig_pos + total_len,
        }
    }

    fn format(&self) -> Vec<u8> {
        assert!(self.payload.len() <= u16::MAX as usize, "payload too large for XBee frame");
        let mut out = Vec::with_capacity(Self::HEADER_LEN + self.payload.len() + Self::FOOTER_LEN);
        out.push(Self::SIGNATURE);
        out.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out.push(Self::checksum(&self.payload));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_frame_empty_payload_round_trip() {
        let frame = SimpleFrame { intent: 0, payload: vec![] };
        let bytes = frame.format();
        assert_eq!(bytes, vec![0xFC, 0x00, 0x00, 0x00, 0x03]);
        match SimpleFrame::parse(&bytes) {
            ParseOutcome::Success { frame: parsed, consumed } => {
                assert_eq!(parsed, frame);
                assert_eq!(consumed, bytes.len());
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn simple_frame_round_trip_with_payload() {
        let frame = SimpleFrame { intent: 0x1234, payload: vec![1, 2, 3, 4] };
        let bytes = frame.format();
        match SimpleFrame::parse(&bytes) {
            ParseOutcome::Success { frame: parsed, .. } => assert_eq!(parsed, frame),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn simple_frame_incomplete_on_short_buffer() {
        let frame = SimpleFrame { intent: 0x1234, payload: vec![1, 2, 3, 4] };
        let bytes = frame.format();
        // The signature is at the front of both truncations, so nothing is
        // known-junk yet — the caller must keep buffering.
        assert_eq!(
            SimpleFrame::parse(&bytes[..bytes.len() - 1]),
            ParseOutcome::Incomplete { consumed: 0 }
        );
        assert_eq!(SimpleFrame::parse(&bytes[..2]), ParseOutcome::Incomplete { consumed: 0 });
    }

    #[test]
    fn simple_frame_incomplete_with_no_signature_discards_whole_buffer() {
        let junk = vec![0x00, 0x11, 0x22, 0x33];
        assert_eq!(SimpleFrame::parse(&junk), ParseOutcome::Incomplete { consumed: junk.len() });
    }

    #[test]
    fn simple_frame_incomplete_with_signature_keeps_only_tail() {
        let mut buf = vec![0x00, 0x11]; // junk before the signature
        buf.push(SimpleFrame::SIGNATURE);
        // header not fully buffered yet
        assert_eq!(SimpleFrame::parse(&buf), ParseOutcome::Incomplete { consumed: 2 });
    }

    #[test]
    fn simple_frame_bad_checksum_skips_one_byte() {
        let frame = SimpleFrame { intent: 0, payload: vec![] };
        let mut bytes = frame.format();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert_eq!(SimpleFrame::parse(&bytes), ParseOutcome::BadChecksum { skip: 1 });
    }

    #[test]
    fn simple_frame_resync_across_junk_bytes() {
        let mut stream = vec![0x00, 0x11]; // junk preceding the first frame
        stream.extend(SimpleFrame { intent: 1, payload: vec![9] }.format());
        match SimpleFrame::parse(&stream) {
            ParseOutcome::Success { frame, consumed } => {
                assert_eq!(frame.intent, 1);
                assert_eq!(consumed, stream.len());
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn simple_frame_resync_sequence_success_badchecksum_success() {
        let mut stream = SimpleFrame { intent: 0, payload: vec![] }.format();
        let mut corrupt = SimpleFrame { intent: 1, payload: vec![5] }.format();
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        stream.extend(&corrupt);
        stream.extend(SimpleFrame { intent: 2, payload: vec![] }.format());

        let ParseOutcome::Success { consumed: c1, .. } = SimpleFrame::parse(&stream) else {
            panic!("expected first Success");
        };
        let rest = &stream[c1..];
        let ParseOutcome::BadChecksum { skip } = SimpleFrame::parse(rest) else {
            panic!("expected BadChecksum");
        };
        let rest = &rest[skip..];
        let ParseOutcome::Success { frame, .. } = SimpleFrame::parse(rest) else {
            panic!("expected second Success");
        };
        assert_eq!(frame.intent, 2);
    }

    #[test]
    fn xbee_frame_round_trip() {
        let frame = XBeeFrame { payload: vec![0x08, 0x01, b'A', b'T'] };
        let bytes = frame.format();
        assert_eq!(bytes[0], XBeeFrame::SIGNATURE);
        match XBeeFrame::parse(&bytes) {
            ParseOutcome::Success { frame: parsed, consumed } => {
                assert_eq!(parsed, frame);
                assert_eq!(consumed, bytes.len());
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn xbee_frame_bad_checksum() {
        let mut bytes = XBeeFrame { payload: vec![1, 2, 3] }.format();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert_eq!(XBeeFrame::parse(&bytes), ParseOutcome::BadChecksum { skip: 1 });
    }
}
