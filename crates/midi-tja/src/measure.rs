//! Measure segmentation with deferred mid-measure signature changes.

use crate::tempo::TempoMap;
use serde::{Deserialize, Serialize};

/// One notation bar on the tick axis. `end_tick` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub index: usize,
    pub start_tick: u64,
    pub end_tick: u64,
    pub numerator: u8,
    pub denominator: u16,
}

impl Measure {
    pub fn len_ticks(&self) -> u64 {
        self.end_tick - self.start_tick
    }

    pub fn contains(&self, tick: u64) -> bool {
        tick >= self.start_tick && tick < self.end_tick
    }
}

/// Ticks in one measure under a signature: ppq × 4 × num / den, at least 1.
fn ticks_per_measure(ppq: u16, numerator: u8, denominator: u16) -> u64 {
    (ppq as u64 * 4 * numerator as u64 / denominator as u64).max(1)
}

/// Partition `[0, terminal_tick)` into gap-free measures.
///
/// The signature active at a measure's start governs its whole length. A
/// signature event strictly inside a measure stays pending until the next
/// boundary at or after its tick; one exactly on a boundary applies
/// immediately. TJA only honors signature changes at measure boundaries.
///
/// `terminal_tick == 0` yields no measures (empty input degrades to empty
/// output). The last measure may extend past `terminal_tick` so the tail is
/// always covered by a full bar.
pub fn segment_measures(map: &TempoMap, terminal_tick: u64) -> Vec<Measure> {
    let signatures = map.signatures();
    let mut measures = Vec::new();

    // signatures[..next] are committed; signatures[next..] are pending
    let (mut active_num, mut active_den) = map.signature_at(0);
    let mut next = signatures.partition_point(|s| s.tick == 0);

    let mut start_tick: u64 = 0;
    let mut index = 0usize;

    while start_tick < terminal_tick {
        // Commit every pending signature whose tick we have reached; the
        // last one wins when several fall inside the previous measure.
        while next < signatures.len() && signatures[next].tick <= start_tick {
            active_num = signatures[next].numerator;
            active_den = signatures[next].denominator;
            next += 1;
        }

        let end_tick = start_tick + ticks_per_measure(map.ppq(), active_num, active_den);
        measures.push(Measure {
            index,
            start_tick,
            end_tick,
            numerator: active_num,
            denominator: active_den,
        });

        start_tick = end_tick;
        index += 1;
    }

    measures
}
