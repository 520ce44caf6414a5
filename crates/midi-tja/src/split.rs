//! Lane splitting: polyphonic channels → monophonic chart lanes.
//!
//! TJA courses are strictly monophonic, so overlapping notes on one channel
//! must fan out across parallel lanes. Lane assignment is interval-graph
//! coloring via a greedy sweep with a min-heap of lane free-times, which
//! uses the fewest possible lanes and runs near-linearly in note count.

use crate::note::TimedNote;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// One monophonic lane of a single channel. Each lane becomes one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub channel: u8,
    pub lane_index: usize,
    pub notes: Vec<TimedNote>,
}

/// Split notes into per-channel monophonic lanes.
///
/// Two notes conflict when their `[on, off)` intervals intersect;
/// instantaneous hits occupy one tick, so two hits at the same tick also
/// conflict. A freed lane is reused as soon as its last note has released,
/// preferring the earliest-freed lane.
pub fn split_lanes(notes: &[TimedNote]) -> Vec<Lane> {
    let mut by_channel: BTreeMap<u8, Vec<TimedNote>> = BTreeMap::new();
    for note in notes {
        by_channel.entry(note.channel).or_default().push(note.clone());
    }

    let mut lanes = Vec::new();
    for (channel, mut channel_notes) in by_channel {
        channel_notes
            .sort_by(|a, b| a.onset_tick.cmp(&b.onset_tick).then(a.pitch.cmp(&b.pitch)));

        let mut channel_lanes: Vec<Vec<TimedNote>> = Vec::new();
        // (free_tick, lane_index); Reverse makes BinaryHeap a min-heap, so
        // the earliest-freed lane surfaces first
        let mut free_times: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();

        for note in channel_notes {
            let lane_index = match free_times.peek() {
                Some(&Reverse((free_tick, lane_index))) if free_tick <= note.onset_tick => {
                    free_times.pop();
                    lane_index
                }
                _ => {
                    channel_lanes.push(Vec::new());
                    channel_lanes.len() - 1
                }
            };
            free_times.push(Reverse((note.blocking_end(), lane_index)));
            channel_lanes[lane_index].push(note);
        }

        tracing::debug!(channel, lanes = channel_lanes.len(), "split channel into lanes");

        lanes.extend(
            channel_lanes
                .into_iter()
                .enumerate()
                .map(|(lane_index, notes)| Lane {
                    channel,
                    lane_index,
                    notes,
                }),
        );
    }

    lanes
}

/// Trim sustained notes so consecutive notes in a lane keep at least
/// `gap_ticks` of daylight, and drop notes squeezed to nothing.
///
/// Long-note charts need a visible gap between a roll tail and the next
/// head; the original converter enforces a 1/192nd-note minimum.
pub fn trim_for_gap(notes: &mut Vec<TimedNote>, gap_ticks: u64) {
    if gap_ticks == 0 {
        return;
    }
    let next_onsets: Vec<Option<u64>> = (0..notes.len())
        .map(|i| notes.get(i + 1).map(|n| n.onset_tick))
        .collect();
    for (note, next_onset) in notes.iter_mut().zip(next_onsets) {
        if let Some(next_onset) = next_onset {
            let limit = next_onset.saturating_sub(gap_ticks);
            note.offset_tick = note.offset_tick.min(limit);
        }
    }
    notes.retain(|n| n.offset_tick > n.onset_tick);
}
