use serde::{Deserialize, Serialize};

/// A single MIDI note with absolute tick timing.
///
/// `offset_tick == onset_tick` marks an instantaneous hit (no sustain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedNote {
    pub onset_tick: u64,
    pub offset_tick: u64,
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
    pub track_index: usize,
}

impl TimedNote {
    pub fn duration_ticks(&self) -> u64 {
        self.offset_tick.saturating_sub(self.onset_tick)
    }

    pub fn is_instant(&self) -> bool {
        self.offset_tick <= self.onset_tick
    }

    /// Tick at which the note stops blocking its lane. Instantaneous hits
    /// occupy one tick so two hits at the same tick still conflict.
    pub fn blocking_end(&self) -> u64 {
        self.offset_tick.max(self.onset_tick + 1)
    }
}
