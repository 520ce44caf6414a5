//! Event extraction: flatten a parsed SMF into timed notes and a timing map.

use crate::note::TimedNote;
use crate::{Error, Result};
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tempo change on the absolute tick axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub microseconds_per_beat: u32,
}

impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.microseconds_per_beat as f64
    }
}

/// A time signature change on the absolute tick axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignatureChange {
    pub tick: u64,
    pub numerator: u8,
    pub denominator: u16,
}

/// Timing skeleton of one MIDI file: resolution, tempo map inputs, extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingContext {
    pub ppq: u16,
    pub tempo_changes: Vec<TempoChange>,
    pub time_signatures: Vec<TimeSignatureChange>,
    /// Last tick seen in any track (notes, meta, or otherwise).
    pub last_tick: u64,
}

/// Extract all notes and timing events from a parsed SMF.
///
/// Note-on/note-off pairing is per (channel, pitch) with a pending stack, so
/// restruck pitches nest correctly; a velocity-0 note-on counts as note-off.
/// Notes left open at the end of a track are closed at the track's final tick.
pub fn extract_events(smf: &Smf) -> Result<(Vec<TimedNote>, TimingContext)> {
    let ppq = match smf.header.timing {
        midly::Timing::Metrical(ticks) => ticks.as_int(),
        midly::Timing::Timecode(_, _) => {
            return Err(Error::InvalidTempoMap(
                "SMPTE timecode timing has no pulses-per-quarter-note".into(),
            ));
        }
    };

    let mut notes = Vec::new();
    let mut tempo_changes = Vec::new();
    let mut time_signatures = Vec::new();
    let mut last_tick: u64 = 0;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut current_tick: u64 = 0;
        // (channel, pitch) → stack of (onset_tick, velocity)
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();

        for event in track {
            current_tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push(TempoChange {
                        tick: current_tick,
                        microseconds_per_beat: tempo.as_int(),
                    });
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    time_signatures.push(TimeSignatureChange {
                        tick: current_tick,
                        numerator: num,
                        denominator: 1u16 << denom_pow.min(15),
                    });
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            pending
                                .entry((ch, key.as_int()))
                                .or_default()
                                .push((current_tick, vel.as_int()));
                        }
                        MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                            // vel=0 NoteOn is NoteOff
                            if let Some(stack) = pending.get_mut(&(ch, key.as_int())) {
                                if let Some((onset, velocity)) = stack.pop() {
                                    notes.push(TimedNote {
                                        onset_tick: onset,
                                        offset_tick: current_tick,
                                        pitch: key.as_int(),
                                        velocity,
                                        channel: ch,
                                        track_index,
                                    });
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }

            last_tick = last_tick.max(current_tick);
        }

        // Close any unclosed notes at the track's final tick
        for ((channel, pitch), stack) in pending {
            for (onset, velocity) in stack {
                notes.push(TimedNote {
                    onset_tick: onset,
                    offset_tick: current_tick,
                    pitch,
                    velocity,
                    channel,
                    track_index,
                });
            }
        }
    }

    // Sort by onset, then pitch for determinism
    notes.sort_by(|a, b| a.onset_tick.cmp(&b.onset_tick).then(a.pitch.cmp(&b.pitch)));

    // Format-1 files may repeat timing meta events across tracks
    tempo_changes.sort_by_key(|t| t.tick);
    tempo_changes.dedup();
    time_signatures.sort_by_key(|t| t.tick);
    time_signatures.dedup();

    let context = TimingContext {
        ppq,
        tempo_changes,
        time_signatures,
        last_tick,
    };

    Ok((notes, context))
}
