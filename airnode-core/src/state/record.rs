//! Fixed-size checksummed record backing the persisted state on raw storage.
//!
//! Layout (little-endian): `magic u32 | s0 f32 | s1 f32 | checksum u32`.
//! [`RecordKv`] stages `put_float` calls in RAM and writes the whole record on
//! `commit`, so a torn write fails the checksum and reads back as absent.

use core::fmt;

use super::{PersistentKv, STATE_KEY_S0, STATE_KEY_S1};

/// Encoded record length in bytes.
pub const RECORD_LEN: usize = 16;

/// Identifies an airnode state record ("AIR1").
pub const RECORD_MAGIC: u32 = 0x3152_4941;

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Errors returned when decoding a stored record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordError {
    /// Storage still holds the erased pattern.
    Erased,
    BadMagic(u32),
    BadChecksum { stored: u32, computed: u32 },
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Erased => f.write_str("record erased"),
            RecordError::BadMagic(magic) => write!(f, "bad record magic 0x{magic:08X}"),
            RecordError::BadChecksum { stored, computed } => write!(
                f,
                "record checksum 0x{stored:08X} does not match 0x{computed:08X}"
            ),
        }
    }
}

/// The persisted pair as it sits on storage.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StateRecord {
    pub s0: f32,
    pub s1: f32,
}

impl StateRecord {
    #[must_use]
    pub const fn new(s0: f32, s1: f32) -> Self {
        Self { s0, s1 }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.s0.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.s1.to_le_bytes());
        let checksum = checksum(&bytes[..12]);
        bytes[12..16].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }

    /// Parses a stored image.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Erased`] for a blank page, and a magic or
    /// checksum error for anything that is not a complete record.
    pub fn decode(bytes: &[u8; RECORD_LEN]) -> Result<Self, RecordError> {
        if bytes.iter().all(|byte| *byte == 0xFF) {
            return Err(RecordError::Erased);
        }

        let magic = read_u32(bytes, 0);
        if magic != RECORD_MAGIC {
            return Err(RecordError::BadMagic(magic));
        }

        let stored = read_u32(bytes, 12);
        let computed = checksum(&bytes[..12]);
        if stored != computed {
            return Err(RecordError::BadChecksum { stored, computed });
        }

        Ok(Self::new(
            f32::from_bits(read_u32(bytes, 4)),
            f32::from_bits(read_u32(bytes, 8)),
        ))
    }
}

fn read_u32(bytes: &[u8; RECORD_LEN], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

// FNV-1a
fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Raw storage holding exactly one record.
pub trait RecordStorage {
    type Error;

    /// Copies the stored bytes into `buf`.
    ///
    /// # Errors
    ///
    /// Returns the storage error when the medium cannot be read.
    fn read(&mut self, buf: &mut [u8; RECORD_LEN]) -> Result<(), Self::Error>;

    /// Replaces the stored record.
    ///
    /// # Errors
    ///
    /// Returns the storage error when erasing or programming fails.
    fn write(&mut self, buf: &[u8; RECORD_LEN]) -> Result<(), Self::Error>;
}

/// Errors raised by [`RecordKv`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordKvError<E> {
    /// The record only has slots for the algorithm state keys.
    UnknownKey,
    /// `commit` was called before both slots were staged.
    Incomplete,
    Storage(E),
}

/// [`PersistentKv`] adapter that keeps both state keys in a single record.
pub struct RecordKv<S> {
    storage: S,
    /// Set once storage has been read; `cached` is authoritative afterwards.
    loaded: bool,
    cached: Option<StateRecord>,
    staged: [Option<f32>; 2],
}

impl<S> RecordKv<S> {
    #[must_use]
    pub const fn new(storage: S) -> Self {
        Self {
            storage,
            loaded: false,
            cached: None,
            staged: [None, None],
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Releases the storage, e.g. to reopen it on the next cycle.
    #[must_use]
    pub fn into_inner(self) -> S {
        self.storage
    }
}

impl<S> RecordKv<S>
where
    S: RecordStorage,
{
    fn record(&mut self) -> Option<StateRecord> {
        if !self.loaded {
            let mut bytes = [0u8; RECORD_LEN];
            self.cached = match self.storage.read(&mut bytes) {
                Ok(()) => StateRecord::decode(&bytes).ok(),
                Err(_) => None,
            };
            self.loaded = true;
        }
        self.cached
    }
}

fn slot_for(key: &str) -> Option<usize> {
    match key {
        STATE_KEY_S0 => Some(0),
        STATE_KEY_S1 => Some(1),
        _ => None,
    }
}

impl<S> PersistentKv for RecordKv<S>
where
    S: RecordStorage,
{
    type Error = RecordKvError<S::Error>;

    fn get_float(&mut self, key: &str) -> Option<f32> {
        let slot = slot_for(key)?;
        if let Some(value) = self.staged[slot] {
            return Some(value);
        }
        self.record()
            .map(|record| if slot == 0 { record.s0 } else { record.s1 })
    }

    fn put_float(&mut self, key: &str, value: f32) -> Result<(), Self::Error> {
        let slot = slot_for(key).ok_or(RecordKvError::UnknownKey)?;
        self.staged[slot] = Some(value);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        let [Some(s0), Some(s1)] = self.staged else {
            return Err(RecordKvError::Incomplete);
        };

        let record = StateRecord::new(s0, s1);
        self.storage
            .write(&record.encode())
            .map_err(RecordKvError::Storage)?;
        self.loaded = true;
        self.cached = Some(record);
        self.staged = [None, None];
        Ok(())
    }
}
