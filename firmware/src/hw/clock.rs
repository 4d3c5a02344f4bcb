//! Cycle clock and the terminal deep-sleep request.
//!
//! Deep sleep is STM32 Standby: SRAM and clocks off, only the backup domain
//! running. The RTC runs from LSI and its wake-up timer, clocked from
//! `ck_spre` (about 1 Hz), raises the internal wake-up line. The core comes
//! back through reset, so every wake is a fresh boot.

/// Longest sleep the 16-bit wake-up counter can express at 1 Hz.
pub const MAX_STANDBY_SECONDS: u32 = 1 << 16;

/// Wake-up timer reload for a sleep of `duration_us`.
///
/// The timer fires after `reload + 1` ticks, so the result is the whole
/// number of seconds minus one, at least one second and at most
/// [`MAX_STANDBY_SECONDS`].
#[must_use]
pub fn wakeup_reload(duration_us: u64) -> u16 {
    let seconds = (duration_us / 1_000_000).clamp(1, u64::from(MAX_STANDBY_SECONDS));
    u16::try_from(seconds - 1).unwrap_or(u16::MAX)
}

#[cfg(target_os = "none")]
pub use target::{EmbassyClock, StandbyUntilAlarm};

#[cfg(target_os = "none")]
mod target {
    use core::ptr;

    use airnode_core::sensors::{Clock, DeepSleep};
    use cortex_m::peripheral::SCB;
    use embassy_time::{Duration, Instant, block_for};

    use super::wakeup_reload;

    const RCC_BASE: usize = 0x4002_1000;
    const RCC_APBENR1: *mut u32 = (RCC_BASE + 0x3C) as *mut u32;
    const RCC_BDCR: *mut u32 = (RCC_BASE + 0x5C) as *mut u32;
    const RCC_CSR: *mut u32 = (RCC_BASE + 0x60) as *mut u32;

    const RCC_APBENR1_RTCAPBEN: u32 = 1 << 10;
    const RCC_APBENR1_PWREN: u32 = 1 << 28;
    const RCC_BDCR_RTCSEL_MASK: u32 = 0b11 << 8;
    const RCC_BDCR_RTCSEL_LSI: u32 = 0b10 << 8;
    const RCC_BDCR_RTCEN: u32 = 1 << 15;
    const RCC_CSR_LSION: u32 = 1;
    const RCC_CSR_LSIRDY: u32 = 1 << 1;

    const RTC_BASE: usize = 0x4000_2800;
    const RTC_ICSR: *mut u32 = (RTC_BASE + 0x0C) as *mut u32;
    const RTC_WUTR: *mut u32 = (RTC_BASE + 0x14) as *mut u32;
    const RTC_CR: *mut u32 = (RTC_BASE + 0x18) as *mut u32;
    const RTC_WPR: *mut u32 = (RTC_BASE + 0x24) as *mut u32;
    const RTC_SCR: *mut u32 = (RTC_BASE + 0x5C) as *mut u32;

    const RTC_ICSR_WUTWF: u32 = 1 << 2;
    const RTC_CR_WUCKSEL_MASK: u32 = 0b111;
    const RTC_CR_WUCKSEL_CK_SPRE: u32 = 0b100;
    const RTC_CR_WUTE: u32 = 1 << 10;
    const RTC_CR_WUTIE: u32 = 1 << 14;
    const RTC_SCR_CWUTF: u32 = 1 << 2;

    const PWR_BASE: usize = 0x4000_7000;
    const PWR_CR1: *mut u32 = PWR_BASE as *mut u32;
    const PWR_CR3: *mut u32 = (PWR_BASE + 0x08) as *mut u32;
    const PWR_SCR: *mut u32 = (PWR_BASE + 0x18) as *mut u32;

    const PWR_CR1_LPMS_MASK: u32 = 0b111;
    const PWR_CR1_LPMS_STANDBY: u32 = 0b011;
    const PWR_CR1_DBP: u32 = 1 << 8;
    const PWR_CR3_EIWUL: u32 = 1 << 15;
    /// CWUF1..CWUF6 plus CSBF.
    const PWR_SCR_CLEAR_ALL: u32 = 0x3F | (1 << 8);

    /// Monotonic clock on the embassy time driver.
    #[derive(Copy, Clone, Default)]
    pub struct EmbassyClock;

    impl Clock for EmbassyClock {
        fn now_ms(&self) -> u64 {
            Instant::now().as_millis()
        }

        fn sleep_ms(&mut self, duration_ms: u64) {
            block_for(Duration::from_millis(duration_ms));
        }
    }

    /// Standby with an RTC wake-up alarm.
    pub struct StandbyUntilAlarm {
        _private: (),
    }

    impl StandbyUntilAlarm {
        /// Starts LSI and clocks the RTC from it. The RTC clock selection
        /// survives Standby, so later boots find it already set.
        pub fn new() -> Self {
            enable_rtc_clock();
            Self { _private: () }
        }
    }

    unsafe fn modify(register: *mut u32, clear: u32, set: u32) {
        unsafe {
            let value = ptr::read_volatile(register);
            ptr::write_volatile(register, (value & !clear) | set);
        }
    }

    fn enable_rtc_clock() {
        unsafe {
            modify(RCC_APBENR1, 0, RCC_APBENR1_PWREN | RCC_APBENR1_RTCAPBEN);
            modify(PWR_CR1, 0, PWR_CR1_DBP);

            modify(RCC_CSR, 0, RCC_CSR_LSION);
            while ptr::read_volatile(RCC_CSR) & RCC_CSR_LSIRDY == 0 {}

            if ptr::read_volatile(RCC_BDCR) & RCC_BDCR_RTCSEL_MASK == 0 {
                modify(RCC_BDCR, RCC_BDCR_RTCSEL_MASK, RCC_BDCR_RTCSEL_LSI);
            }
            modify(RCC_BDCR, 0, RCC_BDCR_RTCEN);
        }
    }

    fn arm_wakeup_timer(reload: u16) {
        unsafe {
            ptr::write_volatile(RTC_WPR, 0xCA);
            ptr::write_volatile(RTC_WPR, 0x53);

            modify(RTC_CR, RTC_CR_WUTE | RTC_CR_WUTIE, 0);
            while ptr::read_volatile(RTC_ICSR) & RTC_ICSR_WUTWF == 0 {}

            ptr::write_volatile(RTC_WUTR, u32::from(reload));
            ptr::write_volatile(RTC_SCR, RTC_SCR_CWUTF);
            modify(
                RTC_CR,
                RTC_CR_WUCKSEL_MASK,
                RTC_CR_WUCKSEL_CK_SPRE | RTC_CR_WUTE | RTC_CR_WUTIE,
            );

            ptr::write_volatile(RTC_WPR, 0xFF);
        }
    }

    fn select_standby() {
        unsafe {
            modify(PWR_CR3, 0, PWR_CR3_EIWUL);
            ptr::write_volatile(PWR_SCR, PWR_SCR_CLEAR_ALL);
            modify(PWR_CR1, PWR_CR1_LPMS_MASK, PWR_CR1_LPMS_STANDBY);
        }
    }

    impl DeepSleep for StandbyUntilAlarm {
        fn enter(&mut self, duration_us: u64) -> ! {
            arm_wakeup_timer(wakeup_reload(duration_us));
            select_standby();

            // SAFETY: the core is only ever parked here and never resumes.
            let mut scb = unsafe { cortex_m::Peripherals::steal() }.SCB;
            scb.set_sleepdeep();
            cortex_m::asm::dsb();
            cortex_m::asm::wfi();

            // A debugger holding the core awake lands here.
            SCB::sys_reset()
        }
    }
}
