//! Gas-index algorithm state persisted across power cycles.
//!
//! The algorithm's baseline tracker needs hours to settle, far longer than a
//! single wake cycle, so its internal pair is written to non-volatile storage
//! at the end of every cycle and restored at the start of the next one. A
//! missing, corrupt, or all-zero pair means "cold start": the algorithm keeps
//! its own default initialization.

use core::fmt;

pub mod record;

pub use record::{RECORD_LEN, RecordError, RecordKv, RecordKvError, RecordStorage, StateRecord};

/// Key holding the first algorithm state value.
pub const STATE_KEY_S0: &str = "gas_s0";
/// Key holding the second algorithm state value.
pub const STATE_KEY_S1: &str = "gas_s1";

/// Opaque internal memory of the gas-index algorithm.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AlgorithmState {
    pub s0: f32,
    pub s1: f32,
}

impl AlgorithmState {
    /// Canonical "no prior state" value.
    pub const COLD_START: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(s0: f32, s1: f32) -> Self {
        Self { s0, s1 }
    }

    /// Returns `true` for the degenerate pair that is treated as absent.
    #[allow(clippy::float_cmp)]
    #[must_use]
    pub fn is_cold_start(&self) -> bool {
        self.s0 == 0.0 && self.s1 == 0.0
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.s0.is_finite() && self.s1.is_finite()
    }

    #[must_use]
    pub const fn as_pair(&self) -> (f32, f32) {
        (self.s0, self.s1)
    }
}

impl From<(f32, f32)> for AlgorithmState {
    fn from((s0, s1): (f32, f32)) -> Self {
        Self::new(s0, s1)
    }
}

/// Why [`StateStore::load`] fell back to the cold-start state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DefaultReason {
    /// One or both keys were never written (or could not be read).
    Missing,
    /// Stored values were not finite numbers.
    Corrupt,
    /// Both values were exactly zero.
    ZeroPair,
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultReason::Missing => f.write_str("missing"),
            DefaultReason::Corrupt => f.write_str("corrupt"),
            DefaultReason::ZeroPair => f.write_str("zero-pair"),
        }
    }
}

/// Result of loading persisted state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoadOutcome {
    Restored,
    Defaulted(DefaultReason),
}

impl LoadOutcome {
    #[must_use]
    pub const fn is_restored(self) -> bool {
        matches!(self, LoadOutcome::Restored)
    }
}

/// Non-volatile float storage addressed by short string keys.
pub trait PersistentKv {
    /// Backend-specific failure.
    type Error;

    /// Reads a value; `None` when the key is absent or unreadable.
    fn get_float(&mut self, key: &str) -> Option<f32>;

    /// Stages or writes a value.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the value cannot be stored.
    fn put_float(&mut self, key: &str, value: f32) -> Result<(), Self::Error>;

    /// Makes staged values durable. Backends that write through need not override this.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the values did not reach storage.
    fn commit(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Failure while persisting the algorithm state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StoreError<E> {
    Put { key: &'static str, error: E },
    Commit(E),
}

impl<E: fmt::Debug> fmt::Display for StoreError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Put { key, error } => write!(f, "write of {key} failed: {error:?}"),
            StoreError::Commit(error) => write!(f, "commit failed: {error:?}"),
        }
    }
}

/// Loads and saves [`AlgorithmState`] through a [`PersistentKv`].
#[derive(Debug)]
pub struct StateStore<K> {
    kv: K,
}

impl<K> StateStore<K>
where
    K: PersistentKv,
{
    #[must_use]
    pub const fn new(kv: K) -> Self {
        Self { kv }
    }

    /// Reads the persisted pair, defaulting to [`AlgorithmState::COLD_START`]
    /// instead of failing.
    pub fn load(&mut self) -> (AlgorithmState, LoadOutcome) {
        let s0 = self.kv.get_float(STATE_KEY_S0);
        let s1 = self.kv.get_float(STATE_KEY_S1);

        let (Some(s0), Some(s1)) = (s0, s1) else {
            return cold_start(DefaultReason::Missing);
        };

        let state = AlgorithmState::new(s0, s1);
        if !state.is_finite() {
            cold_start(DefaultReason::Corrupt)
        } else if state.is_cold_start() {
            cold_start(DefaultReason::ZeroPair)
        } else {
            (state, LoadOutcome::Restored)
        }
    }

    /// Overwrites the persisted pair unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Put`] when a key cannot be staged and
    /// [`StoreError::Commit`] when the backend fails to commit.
    pub fn save(&mut self, state: AlgorithmState) -> Result<(), StoreError<K::Error>> {
        self.kv
            .put_float(STATE_KEY_S0, state.s0)
            .map_err(|error| StoreError::Put {
                key: STATE_KEY_S0,
                error,
            })?;
        self.kv
            .put_float(STATE_KEY_S1, state.s1)
            .map_err(|error| StoreError::Put {
                key: STATE_KEY_S1,
                error,
            })?;
        self.kv.commit().map_err(StoreError::Commit)
    }
}

impl<K> StateStore<K> {
    #[must_use]
    pub const fn kv(&self) -> &K {
        &self.kv
    }

    pub fn kv_mut(&mut self) -> &mut K {
        &mut self.kv
    }

    /// Releases the backing store, e.g. to carry it into the next cycle.
    #[must_use]
    pub fn into_inner(self) -> K {
        self.kv
    }
}

fn cold_start(reason: DefaultReason) -> (AlgorithmState, LoadOutcome) {
    (AlgorithmState::COLD_START, LoadOutcome::Defaulted(reason))
}
