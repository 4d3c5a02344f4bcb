//! Sensor power rail sequencing.
//!
//! The rail brackets the whole cycle: it is driven high before the first
//! sensor transaction and driven low before any sleep request, on the abort
//! path as well as the normal one.

use crate::sensors::PowerRail;

/// Wraps a [`PowerRail`] and tracks the last commanded level.
#[derive(Debug)]
pub struct PowerSequencer<R> {
    rail: R,
    enabled: bool,
}

impl<R> PowerSequencer<R>
where
    R: PowerRail,
{
    /// Creates a sequencer that assumes the rail starts switched off.
    #[must_use]
    pub const fn new(rail: R) -> Self {
        Self {
            rail,
            enabled: false,
        }
    }

    /// Switches the rail on. Always drives the output, so repeated calls are harmless.
    pub fn enable(&mut self) {
        self.rail.set(true);
        self.enabled = true;
    }

    /// Switches the rail off. Always drives the output, so repeated calls are harmless.
    pub fn disable(&mut self) {
        self.rail.set(false);
        self.enabled = false;
    }

}

impl<R> PowerSequencer<R> {
    /// Returns `true` when the last command switched the rail on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Borrows the wrapped rail.
    #[must_use]
    pub const fn rail(&self) -> &R {
        &self.rail
    }

    /// Releases the wrapped rail.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.rail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    #[derive(Default)]
    struct RecordingRail {
        levels: Vec<bool, 8>,
    }

    impl PowerRail for RecordingRail {
        fn set(&mut self, enabled: bool) {
            self.levels.push(enabled).expect("rail log full");
        }
    }

    #[test]
    fn starts_disabled_and_tracks_level() {
        let mut power = PowerSequencer::new(RecordingRail::default());
        assert!(!power.is_enabled());

        power.enable();
        assert!(power.is_enabled());

        power.disable();
        assert!(!power.is_enabled());
        assert_eq!(power.rail().levels.as_slice(), &[true, false]);
    }

    #[test]
    fn repeated_commands_keep_driving_the_rail() {
        let mut power = PowerSequencer::new(RecordingRail::default());
        power.enable();
        power.enable();
        power.disable();
        power.disable();

        assert!(!power.is_enabled());
        assert_eq!(
            power.into_inner().levels.as_slice(),
            &[true, true, false, false]
        );
    }
}
