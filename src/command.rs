//! Classification of a prompt line and its encoding into a frame.

use crate::cbor::{CborError, diag_to_cbor};
use crate::frame::{FrameError, encode_frame, route_header};
use crate::hex::{HexError, parse_hex};
use std::fmt;

const CBOR_PREFIX: &str = "cbor:";
const ROUTED_PREFIX: &str = "cbor_r:";

/// A single line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `exit`
    Exit,
    /// `cbor:<diag>`
    Cbor(String),
    /// `cbor_r:<route>:<diag>`
    RoutedCbor { route: u32, diag: String },
    /// Anything else, read as hex byte pairs. A blank line is an empty payload.
    Hex(String),
}

/// Reasons an input line produces no frame.
#[derive(Debug)]
pub enum InputError {
    Hex(HexError),
    Cbor(CborError),
    Frame(FrameError),
    /// `cbor_r:` not followed by `<digits>:`.
    MalformedRoute(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Hex(e) => write!(f, "Invalid hex input ({e}). Use format like: '01 ff a0'"),
            InputError::Cbor(e) => write!(f, "Error parsing CBOR diagnostic input: {e}"),
            InputError::Frame(e) => write!(f, "Cannot frame input: {e}"),
            InputError::MalformedRoute(s) => {
                write!(f, "Invalid route {s:?}. Use format like: cbor_r:3:null")
            }
        }
    }
}

impl std::error::Error for InputError {}

impl From<HexError> for InputError {
    fn from(e: HexError) -> Self {
        InputError::Hex(e)
    }
}

impl From<CborError> for InputError {
    fn from(e: CborError) -> Self {
        InputError::Cbor(e)
    }
}

impl From<FrameError> for InputError {
    fn from(e: FrameError) -> Self {
        InputError::Frame(e)
    }
}

/// Splits the prefix of `line` off when it matches `prefix` ignoring ASCII case.
fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Classifies a prompt line. Only a `cbor_r:` line without a numeric route fails here;
/// hex and diagnostic text are checked by [`Command::encode`].
pub fn parse_command(line: &str) -> Result<Command, InputError> {
    let line = line.trim();
    if line.eq_ignore_ascii_case("exit") {
        return Ok(Command::Exit);
    }
    if let Some(rest) = strip_prefix_ignore_case(line, ROUTED_PREFIX) {
        let (route, diag) = rest
            .split_once(':')
            .ok_or_else(|| InputError::MalformedRoute(rest.to_string()))?;
        if route.is_empty() || !route.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InputError::MalformedRoute(route.to_string()));
        }
        let route = route
            .parse::<u32>()
            .map_err(|_| InputError::MalformedRoute(route.to_string()))?;
        return Ok(Command::RoutedCbor {
            route,
            diag: diag.trim().to_string(),
        });
    }
    if let Some(rest) = strip_prefix_ignore_case(line, CBOR_PREFIX) {
        return Ok(Command::Cbor(rest.trim().to_string()));
    }
    Ok(Command::Hex(line.to_string()))
}

/// Payload and frame produced by an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    /// CBOR bytes before routing and framing; empty for hex input.
    pub cbor: Vec<u8>,
    /// Complete frame ready to send.
    pub frame: Vec<u8>,
}

impl Command {
    /// Builds the frame to send, or `None` for commands that send nothing.
    pub fn encode(&self) -> Result<Option<Encoded>, InputError> {
        let encoded = match self {
            Command::Exit => return Ok(None),
            Command::Hex(text) => Encoded {
                cbor: Vec::new(),
                frame: encode_frame(&parse_hex(text)?)?,
            },
            Command::Cbor(diag) => {
                let cbor = diag_to_cbor(diag)?;
                let frame = encode_frame(&cbor)?;
                Encoded { cbor, frame }
            }
            Command::RoutedCbor { route, diag } => {
                let cbor = diag_to_cbor(diag)?;
                let mut payload = route_header(*route)?.to_vec();
                payload.extend_from_slice(&cbor);
                let frame = encode_frame(&payload)?;
                Encoded { cbor, frame }
            }
        };
        Ok(Some(encoded))
    }
}
