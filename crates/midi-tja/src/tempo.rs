//! Tempo map: merged tempo/time-signature timelines with exact tick→µs conversion.

use crate::extract::{TempoChange, TimeSignatureChange, TimingContext};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Values assumed when the input carries no tempo or signature at tick 0.
///
/// Injected at construction so callers (and tests) control the assumption
/// instead of a module-level constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingDefaults {
    pub microseconds_per_beat: u32,
    pub numerator: u8,
    pub denominator: u16,
}

impl Default for TimingDefaults {
    fn default() -> Self {
        // 120 BPM, 4/4
        TimingDefaults {
            microseconds_per_beat: 500_000,
            numerator: 4,
            denominator: 4,
        }
    }
}

/// One tempo segment with the exact elapsed time at its start.
///
/// `cum_tick_units` is Σ dt·mpqn over all preceding segments, held in units
/// of 1/PPQ microseconds. The single division by PPQ happens per query, so
/// rounding error never accumulates across segment boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct TempoSegment {
    start_tick: u64,
    microseconds_per_beat: u32,
    cum_tick_units: u128,
}

/// Immutable tick↔time map for one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<TempoSegment>,
    signatures: Vec<TimeSignatureChange>,
}

impl TempoMap {
    /// Build a map from extracted timing events.
    ///
    /// Both timelines are stably sorted by tick; at equal ticks the later
    /// input event overrides the earlier. A tick-0 entry is synthesized from
    /// `defaults` when absent.
    pub fn new(context: &TimingContext, defaults: TimingDefaults) -> Result<Self> {
        Self::from_events(
            context.ppq,
            &context.tempo_changes,
            &context.time_signatures,
            defaults,
        )
    }

    pub fn from_events(
        ppq: u16,
        tempo_changes: &[TempoChange],
        time_signatures: &[TimeSignatureChange],
        defaults: TimingDefaults,
    ) -> Result<Self> {
        if ppq == 0 {
            return Err(Error::InvalidTempoMap("PPQ must be positive".into()));
        }
        if defaults.microseconds_per_beat == 0 {
            return Err(Error::InvalidTempoMap("default tempo must be positive".into()));
        }

        let mut tempos = tempo_changes.to_vec();
        tempos.sort_by_key(|t| t.tick);
        for tempo in &tempos {
            if tempo.microseconds_per_beat == 0 {
                return Err(Error::InvalidTempoMap(format!(
                    "tempo at tick {} must be positive",
                    tempo.tick
                )));
            }
        }
        // Later event wins at a shared tick
        dedup_by_tick(&mut tempos, |t| t.tick);
        if tempos.first().map(|t| t.tick) != Some(0) {
            tempos.insert(
                0,
                TempoChange {
                    tick: 0,
                    microseconds_per_beat: defaults.microseconds_per_beat,
                },
            );
        }

        let mut signatures = time_signatures.to_vec();
        signatures.sort_by_key(|s| s.tick);
        for sig in &signatures {
            if sig.numerator == 0 {
                return Err(Error::InvalidTempoMap(format!(
                    "time signature numerator at tick {} must be positive",
                    sig.tick
                )));
            }
            if sig.denominator == 0 || !sig.denominator.is_power_of_two() {
                return Err(Error::InvalidTempoMap(format!(
                    "time signature denominator {} at tick {} is not a power of two",
                    sig.denominator, sig.tick
                )));
            }
        }
        dedup_by_tick(&mut signatures, |s| s.tick);
        if signatures.first().map(|s| s.tick) != Some(0) {
            signatures.insert(
                0,
                TimeSignatureChange {
                    tick: 0,
                    numerator: defaults.numerator,
                    denominator: defaults.denominator,
                },
            );
        }

        let mut segments = Vec::with_capacity(tempos.len());
        let mut cum: u128 = 0;
        let mut prev: Option<TempoSegment> = None;
        for tempo in &tempos {
            if let Some(p) = prev {
                cum += (tempo.tick - p.start_tick) as u128 * p.microseconds_per_beat as u128;
            }
            let segment = TempoSegment {
                start_tick: tempo.tick,
                microseconds_per_beat: tempo.microseconds_per_beat,
                cum_tick_units: cum,
            };
            segments.push(segment);
            prev = Some(segment);
        }

        Ok(TempoMap {
            ppq,
            segments,
            signatures,
        })
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    /// Exact elapsed microseconds from tick 0, monotonic in `tick`.
    pub fn tick_to_microseconds(&self, tick: u64) -> u64 {
        let segment = self.segment_at(tick);
        let units = segment.cum_tick_units
            + (tick - segment.start_tick) as u128 * segment.microseconds_per_beat as u128;
        (units / self.ppq as u128) as u64
    }

    /// The tempo in force at `tick`.
    pub fn tempo_at(&self, tick: u64) -> u32 {
        self.segment_at(tick).microseconds_per_beat
    }

    /// The time signature in force at `tick`.
    pub fn signature_at(&self, tick: u64) -> (u8, u16) {
        let idx = self
            .signatures
            .partition_point(|s| s.tick <= tick)
            .saturating_sub(1);
        let sig = &self.signatures[idx];
        (sig.numerator, sig.denominator)
    }

    /// Tempo in force at tick 0, as beats per minute (for the TJA header).
    pub fn initial_bpm(&self) -> f64 {
        60_000_000.0 / self.segments[0].microseconds_per_beat as f64
    }

    /// Tempo changes after tick 0 (tick-0 tempo is the chart's base BPM).
    pub fn tempo_changes_after_start(&self) -> impl Iterator<Item = TempoChange> + '_ {
        self.segments.iter().skip(1).map(|s| TempoChange {
            tick: s.start_tick,
            microseconds_per_beat: s.microseconds_per_beat,
        })
    }

    /// Signature changes, tick 0 included.
    pub fn signatures(&self) -> &[TimeSignatureChange] {
        &self.signatures
    }

    /// Last tick carrying a tempo or signature event.
    pub fn last_event_tick(&self) -> u64 {
        let tempo = self.segments.last().map(|s| s.start_tick).unwrap_or(0);
        let sig = self.signatures.last().map(|s| s.tick).unwrap_or(0);
        tempo.max(sig)
    }

    fn segment_at(&self, tick: u64) -> &TempoSegment {
        let idx = self
            .segments
            .partition_point(|s| s.start_tick <= tick)
            .saturating_sub(1);
        &self.segments[idx]
    }
}

/// Keep only the last entry at each tick (input order already stable-sorted).
fn dedup_by_tick<T: Copy>(events: &mut Vec<T>, tick: impl Fn(&T) -> u64) {
    let mut kept: Vec<T> = Vec::with_capacity(events.len());
    for event in events.iter() {
        if kept.last().map(|k| tick(k)) == Some(tick(event)) {
            *kept.last_mut().unwrap() = *event;
        } else {
            kept.push(*event);
        }
    }
    *events = kept;
}
