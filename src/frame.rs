//! Length-prefixed framing and the route header used by the device gateway.
//!
//! A frame is a 2-byte little-endian length followed by that many payload bytes.
//! Routed payloads carry a 4-byte header in front of the data: the marker byte
//! [`ROUTE_MARKER`] and a 3-byte little-endian route id.

use std::fmt;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 2;

/// First byte of a route header.
pub const ROUTE_MARKER: u8 = 0xfd;

/// Largest route id that fits the 3-byte field.
pub const MAX_ROUTE: u32 = 0x00ff_ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The payload does not fit the 16-bit length prefix.
    PayloadTooLong(usize),
    /// The route id does not fit 3 bytes.
    RouteOutOfRange(u32),
    /// A buffer ended before the frame it announces.
    Incomplete { expected: usize, actual: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::PayloadTooLong(len) => {
                write!(f, "payload of {len} bytes exceeds {} bytes", u16::MAX)
            }
            FrameError::RouteOutOfRange(route) => {
                write!(f, "route {route} exceeds {MAX_ROUTE}")
            }
            FrameError::Incomplete { expected, actual } => write!(
                f,
                "incomplete frame of length {actual} (should be {expected})"
            ),
        }
    }
}

impl std::error::Error for FrameError {}

/// Prepends the little-endian length prefix to `payload`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLong(payload.len()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Builds the `FD xx xx xx` header addressing `route`.
pub fn route_header(route: u32) -> Result<[u8; 4], FrameError> {
    if route > MAX_ROUTE {
        return Err(FrameError::RouteOutOfRange(route));
    }
    let [b0, b1, b2, _] = route.to_le_bytes();
    Ok([ROUTE_MARKER, b0, b1, b2])
}

/// Splits a buffer of back-to-back frames into their payloads.
pub fn split_frames(mut data: &[u8]) -> Result<Vec<&[u8]>, FrameError> {
    let mut frames = Vec::new();
    while !data.is_empty() {
        if data.len() < HEADER_LEN {
            return Err(FrameError::Incomplete {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }
        let len = u16::from_le_bytes([data[0], data[1]]) as usize;
        let rest = &data[HEADER_LEN..];
        if rest.len() < len {
            return Err(FrameError::Incomplete {
                expected: len,
                actual: rest.len(),
            });
        }
        let (payload, tail) = rest.split_at(len);
        frames.push(payload);
        data = tail;
    }
    Ok(frames)
}
