//! Gas-index state record on the last flash page.

use airnode_core::state::RECORD_LEN;

/// STM32G0B1KE main flash size.
pub const FLASH_SIZE: u32 = 512 * 1024;
/// Erase granularity of the G0 flash.
pub const PAGE_SIZE: u32 = 2 * 1024;
/// Offset of the page reserved for the state record.
pub const STATE_PAGE_OFFSET: u32 = FLASH_SIZE - PAGE_SIZE;

const _: () = assert!(RECORD_LEN % 8 == 0, "G0 flash programs whole double words");

#[cfg(target_os = "none")]
pub use target::FlashRecordStorage;

#[cfg(target_os = "none")]
mod target {
    use airnode_core::state::{RECORD_LEN, RecordStorage};
    use embassy_stm32::flash::{Blocking, Error, Flash};

    use super::{PAGE_SIZE, STATE_PAGE_OFFSET};

    /// Keeps one record at the start of the reserved page.
    pub struct FlashRecordStorage<'d> {
        flash: Flash<'d, Blocking>,
    }

    impl<'d> FlashRecordStorage<'d> {
        pub fn new(flash: Flash<'d, Blocking>) -> Self {
            Self { flash }
        }
    }

    impl RecordStorage for FlashRecordStorage<'_> {
        type Error = Error;

        fn read(&mut self, buf: &mut [u8; RECORD_LEN]) -> Result<(), Self::Error> {
            self.flash.blocking_read(STATE_PAGE_OFFSET, buf)
        }

        fn write(&mut self, buf: &[u8; RECORD_LEN]) -> Result<(), Self::Error> {
            self.flash
                .blocking_erase(STATE_PAGE_OFFSET, STATE_PAGE_OFFSET + PAGE_SIZE)?;
            self.flash.blocking_write(STATE_PAGE_OFFSET, buf)
        }
    }
}
