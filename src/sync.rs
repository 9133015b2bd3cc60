//! Frame synchronisation over the raw receive window.

use std::fmt;

use crate::codec::{
    starts_with_header, CONFIRM_HEADER, HANDSHAKE_HEADER, KNOWN_HEADERS, LENGTH_BIAS,
    LENGTH_OFFSET, MAX_FRAME_LEN, PACKET_HEADER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitError {
    /// A length field claimed more than the protocol allows; the rest of the
    /// window is untrustworthy.
    Oversized { offset: usize, declared: usize },
}

impl fmt::Display for SplitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitError::Oversized { offset, declared } => write!(
                f,
                "frame at offset {offset} declares {declared} bytes (max {MAX_FRAME_LEN})"
            ),
        }
    }
}

/// Rotation search: the number of left-rotations of `buf` after which it
/// begins with `header`. Comparison wraps around the end of the buffer.
pub fn find_header_start(buf: &[u8], header: &[u8]) -> Option<usize> {
    let len = buf.len();
    if len == 0 || header.is_empty() {
        return None;
    }
    (0..len).find(|&rotation| {
        header
            .iter()
            .enumerate()
            .all(|(i, b)| buf[(rotation + i) % len] == *b)
    })
}

/// Pick the first frame start for the current link phase. The confirm header
/// is the fallback when the phase header is absent.
pub fn find_frame_start(buf: &[u8], handshaking: bool) -> Option<usize> {
    let primary = if handshaking {
        &HANDSHAKE_HEADER
    } else {
        &PACKET_HEADER
    };
    find_header_start(buf, primary).or_else(|| find_header_start(buf, &CONFIRM_HEADER))
}

/// Walk back-to-back length-prefixed frames from `start`, handing each one to
/// `on_frame`. Returns the number of frames delivered.
pub fn split_frames<F>(buf: &[u8], start: usize, mut on_frame: F) -> Result<usize, SplitError>
where
    F: FnMut(&[u8]),
{
    let mut offset = start;
    let mut count = 0;

    while offset < buf.len() {
        let Some(&len_byte) = buf.get(offset + LENGTH_OFFSET) else {
            break;
        };
        let declared = usize::from(len_byte) + LENGTH_BIAS;
        if declared > MAX_FRAME_LEN {
            return Err(SplitError::Oversized { offset, declared });
        }
        let end = offset + declared;
        if end > buf.len() {
            break;
        }

        on_frame(&buf[offset..end]);
        count += 1;
        offset = end;

        if offset < buf.len() && !starts_with_header(&buf[offset..]) {
            match next_header(&buf[offset..]) {
                Some(skip) => offset += skip,
                None => break,
            }
        }
    }

    Ok(count)
}

fn next_header(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(3)
        .position(|w| KNOWN_HEADERS.iter().any(|h| w == h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_command, encode_reply};

    #[test]
    fn header_found_at_every_rotation() {
        let base: Vec<u8> = (10..30).collect();
        for pos in 0..base.len() {
            let mut buf = base.clone();
            for (i, b) in PACKET_HEADER.iter().enumerate() {
                let idx = (pos + i) % buf.len();
                buf[idx] = *b;
            }
            assert_eq!(find_header_start(&buf, &PACKET_HEADER), Some(pos), "pos {pos}");
        }
    }

    #[test]
    fn header_absent_returns_none() {
        let buf = [0x02, 0x00, 0x04, 0x02, 0x01, 0x03, 0x00, 0x03];
        assert_eq!(find_header_start(&buf, &PACKET_HEADER), None);
        assert_eq!(find_header_start(&[], &PACKET_HEADER), None);
    }

    #[test]
    fn phase_selects_header_with_confirm_fallback() {
        let mut buf = vec![0xaa, 0xbb];
        buf.extend_from_slice(&HANDSHAKE_HEADER);
        buf.extend_from_slice(&[0x80, 0, 0, 0, 0x7e]);
        assert_eq!(find_frame_start(&buf, true), Some(2));
        assert_eq!(find_frame_start(&buf, false), None);

        let confirm = [0x11, 0x02, 0x00, 0x02, 0x82, 0, 0, 0, 0xfb];
        assert_eq!(find_frame_start(&confirm, true), Some(1));
        assert_eq!(find_frame_start(&confirm, false), Some(1));
    }

    #[test]
    fn splits_back_to_back_frames() {
        let a = encode_reply(&[0xbb, 0x16]).unwrap();
        let b = encode_command(&[0xb3, 0x15]).unwrap();
        let c = encode_reply(&[0x80]).unwrap();
        let mut buf = vec![0x55, 0x66];
        buf.extend_from_slice(&a);
        buf.extend_from_slice(&b);
        buf.extend_from_slice(&c);

        let mut seen = Vec::new();
        let n = split_frames(&buf, 2, |f| seen.push(f.to_vec())).unwrap();
        assert_eq!(n, 3);
        assert_eq!(seen, vec![a.to_vec(), b.to_vec(), c.to_vec()]);
    }

    #[test]
    fn truncated_tail_is_dropped() {
        let a = encode_reply(&[0xbe, 0x05]).unwrap();
        let b = encode_reply(&[0xbb, 0x16]).unwrap();
        let mut buf = a.to_vec();
        buf.extend_from_slice(&b[..9]);

        let mut seen = 0;
        assert_eq!(split_frames(&buf, 0, |_| seen += 1), Ok(1));
        assert_eq!(seen, 1);

        // not even a length byte
        assert_eq!(split_frames(&a[..4], 0, |_| seen += 1), Ok(0));
    }

    #[test]
    fn oversized_length_aborts_chunk() {
        let good = encode_reply(&[0xbb, 0x16]).unwrap();
        let mut bad = encode_reply(&[0xbe, 0x05]).unwrap();
        bad[LENGTH_OFFSET] = 40;
        let mut buf = good.to_vec();
        buf.extend_from_slice(&bad);
        buf.extend_from_slice(&good);

        let mut seen = 0;
        let err = split_frames(&buf, 0, |_| seen += 1).unwrap_err();
        assert_eq!(
            err,
            SplitError::Oversized {
                offset: good.len(),
                declared: 48
            }
        );
        assert_eq!(seen, 1);
    }

    #[test]
    fn resyncs_over_noise_between_frames() {
        let a = encode_reply(&[0xbb, 0x16]).unwrap();
        let b = encode_reply(&[0xbe, 0x05]).unwrap();
        let mut buf = a.to_vec();
        buf.extend_from_slice(&[0xff, 0x00, 0x13]);
        buf.extend_from_slice(&b);

        let mut seen = Vec::new();
        assert_eq!(split_frames(&buf, 0, |f| seen.push(f.to_vec())), Ok(2));
        assert_eq!(seen[1], b.to_vec());

        let mut tail_noise = a.to_vec();
        tail_noise.extend_from_slice(&[0xff; 12]);
        assert_eq!(split_frames(&tail_noise, 0, |_| {}), Ok(1));
    }

    #[test]
    fn start_past_end_yields_nothing() {
        let a = encode_reply(&[0xbb, 0x16]).unwrap();
        assert_eq!(split_frames(&a, a.len(), |_| {}), Ok(0));
        assert_eq!(split_frames(&a, a.len() + 5, |_| {}), Ok(0));
    }
}
