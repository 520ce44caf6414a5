//! Per-measure grid resolution: the minimal uniform subdivision that holds
//! every event tick exactly.
//!
//! All arithmetic is integer/rational. Floating point would misreport common
//! musical ratios (a triplet at 1/3 of a measure has no exact float) and must
//! not appear here.

use crate::feedback::{Feedback, FeedbackCollector};
use crate::measure::Measure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridOptions {
    /// Upper bound on cells per measure. TJA charts conventionally top out
    /// at 192nd-note resolution.
    pub max_resolution: u64,
}

impl Default for GridOptions {
    fn default() -> Self {
        GridOptions { max_resolution: 192 }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

/// Find the minimal resolution for `measure` that places every tick in
/// `ticks` on a grid line, capped at `options.max_resolution`.
///
/// Each in-measure offset reduces to a fraction of the measure; the answer
/// is the LCM of the reduced denominators. A denominator that would push the
/// LCM past the cap is skipped — the affected event is later snapped to the
/// nearest line and reported by [`snap_to_grid`]'s caller.
///
/// Ticks outside `[start_tick, end_tick)` are ignored.
pub fn resolve_grid(measure: &Measure, ticks: &[u64], options: GridOptions) -> u64 {
    let len = measure.len_ticks();
    let mut resolution: u64 = 1;

    for &tick in ticks {
        if !measure.contains(tick) {
            continue;
        }
        let rel = tick - measure.start_tick;
        if rel == 0 {
            continue; // measure start is always on the grid
        }
        let denominator = len / gcd(rel, len);
        let candidate = lcm(resolution, denominator);
        if candidate <= options.max_resolution {
            resolution = candidate;
        }
    }

    resolution
}

/// Map `tick` to a cell index in `[0, resolution)`.
///
/// Returns the position and whether it was exact; inexact ticks round to the
/// nearest grid line (ties round up).
pub fn snap_to_grid(measure: &Measure, resolution: u64, tick: u64) -> (u64, bool) {
    let len = measure.len_ticks();
    let rel = tick.saturating_sub(measure.start_tick).min(len);
    let scaled = rel as u128 * resolution as u128;
    let exact = scaled % len as u128 == 0;
    let position = ((scaled + len as u128 / 2) / len as u128) as u64;
    (position.min(resolution.saturating_sub(1)), exact)
}

/// [`snap_to_grid`] plus quantization-loss reporting for inexact snaps.
pub fn snap_reporting(
    measure: &Measure,
    resolution: u64,
    tick: u64,
    collector: &mut FeedbackCollector,
) -> u64 {
    let (position, exact) = snap_to_grid(measure, resolution, tick);
    if !exact {
        collector.push(
            Feedback::warning(format!(
                "tick {tick} rounded to grid line {position}/{resolution}"
            ))
            .at_tick(tick)
            .in_measure(measure.index),
        );
    }
    position
}
