//! Sensirion I2C word framing.
//!
//! Every 16-bit word on the wire is sent big-endian and followed by a CRC-8
//! (polynomial 0x31, init 0xFF). Commands are a bare 16-bit code optionally
//! followed by CRC-protected argument words.

use core::fmt;

use heapless::Vec;

pub const CRC8_POLYNOMIAL: u8 = 0x31;
pub const CRC8_INIT: u8 = 0xFF;

/// Bytes occupied by one word plus its CRC.
pub const WORD_LEN: usize = 3;

/// Errors raised while building or parsing Sensirion frames.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameError {
    /// Buffer length does not match the expected word count.
    Length { expected: usize, actual: usize },
    /// The CRC attached to a word did not match its data.
    Crc { word: usize },
    /// The output buffer cannot hold the command and its arguments.
    Capacity,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Length { expected, actual } => {
                write!(f, "frame length {actual}, expected {expected}")
            }
            FrameError::Crc { word } => write!(f, "crc mismatch on word {word}"),
            FrameError::Capacity => f.write_str("frame buffer too small"),
        }
    }
}

/// Computes the Sensirion CRC-8 over `data`.
#[must_use]
pub const fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;
    let mut index = 0;
    while index < data.len() {
        crc ^= data[index];
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        index += 1;
    }
    crc
}

/// Encodes one data word followed by its CRC.
#[must_use]
pub const fn encode_word(word: u16) -> [u8; WORD_LEN] {
    let bytes = word.to_be_bytes();
    [bytes[0], bytes[1], crc8(&bytes)]
}

/// Builds a command frame with CRC-protected argument words.
///
/// # Errors
///
/// Returns [`FrameError::Capacity`] when the frame does not fit in `N` bytes.
pub fn command_frame<const N: usize>(command: u16, args: &[u16]) -> Result<Vec<u8, N>, FrameError> {
    let mut frame = Vec::new();
    frame
        .extend_from_slice(&command.to_be_bytes())
        .map_err(|_| FrameError::Capacity)?;
    for arg in args {
        frame
            .extend_from_slice(&encode_word(*arg))
            .map_err(|_| FrameError::Capacity)?;
    }
    Ok(frame)
}

/// Decodes `N` CRC-checked words from a response buffer.
///
/// # Errors
///
/// Returns [`FrameError::Length`] for a short or long buffer and
/// [`FrameError::Crc`] when a word fails its checksum.
pub fn decode_words<const N: usize>(bytes: &[u8]) -> Result<[u16; N], FrameError> {
    let expected = N * WORD_LEN;
    if bytes.len() != expected {
        return Err(FrameError::Length {
            expected,
            actual: bytes.len(),
        });
    }

    let mut words = [0u16; N];
    for (index, chunk) in bytes.chunks_exact(WORD_LEN).enumerate() {
        if crc8(&chunk[..2]) != chunk[2] {
            return Err(FrameError::Crc { word: index });
        }
        words[index] = u16::from_be_bytes([chunk[0], chunk[1]]);
    }
    Ok(words)
}
