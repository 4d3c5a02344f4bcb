//! Blocking I2C access shared by the three Sensirion drivers.
//!
//! The drivers only need "write a frame, wait, read a frame", so they are
//! written against [`SensirionBus`]. On target the bus is one embassy I2C
//! peripheral behind a blocking mutex; host tests script the bytes instead.

use core::fmt;

use airnode_core::sensors::frame::FrameError;

/// Minimal bus surface the Sensirion command set needs.
pub trait SensirionBus {
    type Error: fmt::Debug;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error>;

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Blocks for the command execution time given in the datasheet.
    fn delay_ms(&mut self, duration_ms: u32);
}

/// Failure of a single Sensirion transaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransactionError<E> {
    Bus(E),
    Frame(FrameError),
}

impl<E> From<FrameError> for TransactionError<E> {
    fn from(error: FrameError) -> Self {
        TransactionError::Frame(error)
    }
}

impl<E: fmt::Debug> fmt::Display for TransactionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Bus(error) => write!(f, "i2c error {error:?}"),
            TransactionError::Frame(error) => write!(f, "{error}"),
        }
    }
}

#[cfg(target_os = "none")]
pub use target::{SharedI2c, SharedI2cBus};

#[cfg(target_os = "none")]
mod target {
    use core::cell::RefCell;

    use embassy_stm32::i2c::{Error, I2c};
    use embassy_stm32::mode::Blocking;
    use embassy_sync::blocking_mutex::Mutex;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_time::{Duration, block_for};

    use super::SensirionBus;

    /// One I2C peripheral shared by every driver on the sensor rail.
    pub type SharedI2cBus = Mutex<NoopRawMutex, RefCell<I2c<'static, Blocking>>>;

    /// Per-driver handle onto the shared bus.
    #[derive(Copy, Clone)]
    pub struct SharedI2c {
        bus: &'static SharedI2cBus,
    }

    impl SharedI2c {
        pub const fn new(bus: &'static SharedI2cBus) -> Self {
            Self { bus }
        }
    }

    impl SensirionBus for SharedI2c {
        type Error = Error;

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
            self.bus
                .lock(|i2c| i2c.borrow_mut().blocking_write(address, bytes))
        }

        fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
            self.bus
                .lock(|i2c| i2c.borrow_mut().blocking_read(address, buffer))
        }

        fn delay_ms(&mut self, duration_ms: u32) {
            block_for(Duration::from_millis(u64::from(duration_ms)));
        }
    }
}
