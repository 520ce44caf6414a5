//! Note classification: raw MIDI notes → TJA notation symbols.

use crate::feedback::{Feedback, FeedbackCollector};
use crate::note::TimedNote;
use crate::tempo::TempoMap;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// TJA note codes a conversion can target.
pub const KNOWN_CODES: &str = "012345679ABCDFGHI";
/// Codes that span a tick range (drumrolls, balloons, hidden rolls).
pub const LONG_CODES: &str = "5679DHI";
/// Long codes whose hit count is tuned from the sustained duration.
pub const BALLOON_CODES: &str = "79D";

/// A validated TJA note code character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteCode(char);

impl NoteCode {
    pub fn new(code: char) -> Result<Self> {
        if KNOWN_CODES.contains(code) {
            Ok(NoteCode(code))
        } else {
            Err(Error::UnknownNoteCode(code))
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    pub fn is_long(&self) -> bool {
        LONG_CODES.contains(self.0)
    }

    pub fn is_balloon(&self) -> bool {
        BALLOON_CODES.contains(self.0)
    }
}

impl Default for NoteCode {
    /// The balloon code, matching the original converter's default mode.
    fn default() -> Self {
        NoteCode('7')
    }
}

impl std::fmt::Display for NoteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notation symbol assigned to one chart cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteSymbol {
    Empty,
    /// Instantaneous hit.
    Hit(NoteCode),
    /// Sustained span without a tuned hit count.
    Roll(NoteCode),
    /// Duration-tuned sustained note; `hits` feeds the BALLOON header.
    Balloon { code: NoteCode, hits: u32 },
}

impl NoteSymbol {
    /// Character written at the symbol's start cell.
    pub fn start_char(&self) -> char {
        match self {
            NoteSymbol::Empty => '0',
            NoteSymbol::Hit(code) | NoteSymbol::Roll(code) => code.as_char(),
            NoteSymbol::Balloon { code, .. } => code.as_char(),
        }
    }

    /// Sustained symbols are closed with an `8` tail cell.
    pub fn has_tail(&self) -> bool {
        matches!(self, NoteSymbol::Roll(_) | NoteSymbol::Balloon { .. })
    }
}

/// Pitch → balloon unit duration (µs per hit) lookup.
///
/// The default table follows the original converter: one hit per period of
/// the pitch's equal-tempered frequency, so higher pitches pop faster.
/// Custom tables may omit pitches; classification then falls back to a roll
/// and reports the unmapped pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalloonTable {
    unit_micros: HashMap<u8, u64>,
}

impl BalloonTable {
    /// One entry per MIDI pitch, derived from A440 equal temperament.
    pub fn equal_tempered() -> Self {
        let unit_micros = (0u8..=127)
            .map(|pitch| {
                let hz = 440.0 * f64::powf(2.0, (pitch as f64 - 69.0) / 12.0);
                (pitch, (1_000_000.0 / hz).round().max(1.0) as u64)
            })
            .collect();
        BalloonTable { unit_micros }
    }

    pub fn from_units(entries: impl IntoIterator<Item = (u8, u64)>) -> Self {
        BalloonTable {
            unit_micros: entries.into_iter().filter(|&(_, unit)| unit > 0).collect(),
        }
    }

    pub fn unit_micros(&self, pitch: u8) -> Option<u64> {
        self.unit_micros.get(&pitch).copied()
    }
}

impl Default for BalloonTable {
    fn default() -> Self {
        Self::equal_tempered()
    }
}

/// Classify one note under the selected code.
///
/// Instantaneous notes (and any note under a non-long code) become hits.
/// Sustained notes under a balloon code get a hit count from their real
/// duration; under other long codes they become plain rolls.
pub fn classify_note(
    note: &TimedNote,
    code: NoteCode,
    tempo_map: &TempoMap,
    balloons: &BalloonTable,
    collector: &mut FeedbackCollector,
) -> NoteSymbol {
    if note.is_instant() || !code.is_long() {
        return NoteSymbol::Hit(code);
    }

    if code.is_balloon() {
        match balloons.unit_micros(note.pitch) {
            Some(unit) => {
                let duration = tempo_map.tick_to_microseconds(note.offset_tick)
                    - tempo_map.tick_to_microseconds(note.onset_tick);
                let hits = (duration / unit).max(1);
                return NoteSymbol::Balloon {
                    code,
                    hits: hits.min(u32::MAX as u64) as u32,
                };
            }
            None => {
                collector.push(
                    Feedback::warning(format!(
                        "pitch {} has no balloon entry, using a plain roll",
                        note.pitch
                    ))
                    .at_tick(note.onset_tick),
                );
            }
        }
    }

    NoteSymbol::Roll(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TempoChange;
    use crate::tempo::{TempoMap, TimingDefaults};
    use pretty_assertions::assert_eq;

    fn tempo_map() -> TempoMap {
        let tempos = [TempoChange {
            tick: 0,
            microseconds_per_beat: 500_000,
        }];
        TempoMap::from_events(480, &tempos, &[], TimingDefaults::default()).unwrap()
    }

    fn note(onset: u64, offset: u64, pitch: u8) -> TimedNote {
        TimedNote {
            onset_tick: onset,
            offset_tick: offset,
            pitch,
            velocity: 100,
            channel: 0,
            track_index: 0,
        }
    }

    #[test]
    fn note_code_validation() {
        assert!(NoteCode::new('7').is_ok());
        assert!(NoteCode::new('1').is_ok());
        assert!(matches!(NoteCode::new('z'), Err(Error::UnknownNoteCode('z'))));

        let don = NoteCode::new('1').unwrap();
        assert!(!don.is_long());
        let roll = NoteCode::new('5').unwrap();
        assert!(roll.is_long() && !roll.is_balloon());
        let balloon = NoteCode::default();
        assert!(balloon.is_long() && balloon.is_balloon());
    }

    #[test]
    fn instant_note_is_a_hit() {
        let mut collector = FeedbackCollector::new();
        let symbol = classify_note(
            &note(0, 0, 60),
            NoteCode::default(),
            &tempo_map(),
            &BalloonTable::default(),
            &mut collector,
        );
        assert_eq!(symbol, NoteSymbol::Hit(NoteCode::default()));
    }

    #[test]
    fn sustained_note_under_hit_code_is_a_hit() {
        let mut collector = FeedbackCollector::new();
        let code = NoteCode::new('1').unwrap();
        let symbol = classify_note(
            &note(0, 960, 60),
            code,
            &tempo_map(),
            &BalloonTable::default(),
            &mut collector,
        );
        assert_eq!(symbol, NoteSymbol::Hit(code));
    }

    #[test]
    fn balloon_hits_scale_with_duration_and_pitch() {
        // A4 = 440 Hz → unit 2273 µs. Two beats at 120 BPM = 1_000_000 µs.
        let mut collector = FeedbackCollector::new();
        let symbol = classify_note(
            &note(0, 960, 69),
            NoteCode::default(),
            &tempo_map(),
            &BalloonTable::default(),
            &mut collector,
        );
        match symbol {
            NoteSymbol::Balloon { hits, .. } => assert_eq!(hits, 1_000_000 / 2273),
            other => panic!("expected balloon, got {other:?}"),
        }
        assert!(collector.feedback().is_empty());
    }

    #[test]
    fn very_short_balloon_still_needs_one_hit() {
        let mut collector = FeedbackCollector::new();
        let symbol = classify_note(
            &note(0, 1, 69),
            NoteCode::default(),
            &tempo_map(),
            &BalloonTable::default(),
            &mut collector,
        );
        assert_eq!(
            symbol,
            NoteSymbol::Balloon {
                code: NoteCode::default(),
                hits: 1
            }
        );
    }

    #[test]
    fn unmapped_pitch_falls_back_to_roll() {
        let table = BalloonTable::from_units([(60, 5_000)]);
        let mut collector = FeedbackCollector::new();
        let symbol = classify_note(
            &note(0, 960, 61),
            NoteCode::default(),
            &tempo_map(),
            &table,
            &mut collector,
        );
        assert_eq!(symbol, NoteSymbol::Roll(NoteCode::default()));
        assert_eq!(collector.feedback().len(), 1);
    }

    #[test]
    fn long_non_balloon_code_is_a_roll() {
        let code = NoteCode::new('5').unwrap();
        let mut collector = FeedbackCollector::new();
        let symbol = classify_note(
            &note(0, 960, 60),
            code,
            &tempo_map(),
            &BalloonTable::default(),
            &mut collector,
        );
        assert_eq!(symbol, NoteSymbol::Roll(code));
    }
}
