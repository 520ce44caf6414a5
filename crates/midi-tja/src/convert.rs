//! Conversion pipeline: timed notes + timing context → quantized charts.

use crate::classify::{classify_note, BalloonTable, NoteCode, NoteSymbol};
use crate::extract::TimingContext;
use crate::feedback::{ConvertResult, FeedbackCollector};
use crate::grid::{resolve_grid, snap_reporting, snap_to_grid, GridOptions};
use crate::measure::{segment_measures, Measure};
use crate::note::TimedNote;
use crate::split::{split_lanes, trim_for_gap, Lane};
use crate::tempo::{TempoMap, TimingDefaults};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Options for one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// TJA code the notes convert into. Default `7` (balloon mode).
    pub code: NoteCode,
    pub grid: GridOptions,
    pub defaults: TimingDefaults,
    pub balloon_table: BalloonTable,
    /// Minimum gap between consecutive long notes, as a fraction
    /// (numerator, denominator) of a whole note. `None` means 1/192 when the
    /// code is long and no gap otherwise.
    pub long_gap: Option<(u64, u64)>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            code: NoteCode::default(),
            grid: GridOptions::default(),
            defaults: TimingDefaults::default(),
            balloon_table: BalloonTable::default(),
            long_gap: None,
        }
    }
}

/// Content of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Start(NoteSymbol),
    /// Closes the preceding roll or balloon (`8`).
    Tail,
}

impl Cell {
    pub fn as_char(&self) -> char {
        match self {
            Cell::Start(symbol) => symbol.start_char(),
            Cell::Tail => '8',
        }
    }
}

/// One measure of one chart: a sparse cell row plus timing directives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartMeasure {
    pub measure: Measure,
    pub resolution: u64,
    /// (position, cell), sorted by position, at most one cell per position.
    pub cells: Vec<(u64, Cell)>,
    /// (position, bpm) pairs for `#BPMCHANGE` directives.
    pub tempo_changes: Vec<(u64, f64)>,
    /// Set when the renderer should emit `#MEASURE` before this bar.
    pub signature: Option<(u8, u16)>,
}

/// One monophonic output course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub channel: u8,
    pub lane_index: usize,
    /// Balloon hit counts in note order, for the `BALLOON:` header.
    pub balloons: Vec<u32>,
    pub measures: Vec<ChartMeasure>,
}

/// Full result of one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub ppq: u16,
    pub initial_bpm: f64,
    pub charts: Vec<Chart>,
}

/// Convert extracted notes and timing into quantized charts.
///
/// Best-effort: structural problems (bad PPQ, zero tempo, malformed
/// signature) abort with an error before any output; per-note anomalies are
/// collected as feedback on the returned value.
pub fn convert(
    notes: &[TimedNote],
    context: &TimingContext,
    options: &ConvertOptions,
) -> Result<ConvertResult<Conversion>> {
    let tempo_map = TempoMap::new(context, options.defaults)?;
    let mut collector = FeedbackCollector::new();

    let gap_ticks = long_gap_ticks(context.ppq, options);

    let mut lanes = split_lanes(notes);
    for lane in &mut lanes {
        trim_for_gap(&mut lane.notes, gap_ticks);
    }
    lanes.retain(|lane| !lane.notes.is_empty());
    if lanes.is_empty() {
        // Keep one empty chart so the timing skeleton still renders
        lanes.push(Lane {
            channel: 0,
            lane_index: 0,
            notes: Vec::new(),
        });
    }

    let last_note_tick = lanes
        .iter()
        .flat_map(|lane| lane.notes.iter())
        .map(|n| n.offset_tick.max(n.onset_tick))
        .max();
    let last_event_tick = match (last_note_tick, tempo_map.last_event_tick()) {
        (None, 0) if context.tempo_changes.is_empty() && context.time_signatures.is_empty() => {
            None
        }
        (note, timing) => Some(note.unwrap_or(0).max(timing)),
    };
    // +1 turns the inclusive last event tick into exclusive coverage
    let terminal_tick = last_event_tick.map(|t| t + 1).unwrap_or(0);

    let measures = segment_measures(&tempo_map, terminal_tick);
    let tempo_changes: Vec<_> = tempo_map.tempo_changes_after_start().collect();

    tracing::debug!(
        lanes = lanes.len(),
        measures = measures.len(),
        terminal_tick,
        "segmented conversion input"
    );

    let charts = lanes
        .iter()
        .map(|lane| build_chart(lane, &measures, &tempo_changes, &tempo_map, options, &mut collector))
        .collect();

    let conversion = Conversion {
        ppq: context.ppq,
        initial_bpm: tempo_map.initial_bpm(),
        charts,
    };

    let feedback = collector.into_feedback();
    if !feedback.is_empty() {
        tracing::warn!(count = feedback.len(), "conversion finished with warnings");
    }
    Ok(ConvertResult::new(conversion, feedback))
}

fn long_gap_ticks(ppq: u16, options: &ConvertOptions) -> u64 {
    let whole_note = ppq as u64 * 4;
    match options.long_gap {
        Some((numerator, denominator)) if denominator > 0 => {
            whole_note * numerator / denominator
        }
        Some(_) => 0,
        None if options.code.is_long() => whole_note / 192,
        None => 0,
    }
}

fn build_chart(
    lane: &Lane,
    measures: &[Measure],
    tempo_changes: &[crate::extract::TempoChange],
    tempo_map: &TempoMap,
    options: &ConvertOptions,
    collector: &mut FeedbackCollector,
) -> Chart {
    let classified: Vec<(TimedNote, NoteSymbol)> = lane
        .notes
        .iter()
        .map(|note| {
            let symbol = classify_note(
                note,
                options.code,
                tempo_map,
                &options.balloon_table,
                collector,
            );
            (note.clone(), symbol)
        })
        .collect();

    let balloons = classified
        .iter()
        .filter_map(|(_, symbol)| match symbol {
            NoteSymbol::Balloon { hits, .. } => Some(*hits),
            _ => None,
        })
        .collect();

    let mut chart_measures = Vec::with_capacity(measures.len());
    let mut previous_signature: Option<(u8, u16)> = None;

    for measure in measures {
        // Every tick that must land on this measure's grid: note heads,
        // roll/balloon tails, and tempo changes
        let mut grid_ticks: Vec<u64> = Vec::new();
        for (note, symbol) in &classified {
            if measure.contains(note.onset_tick) {
                grid_ticks.push(note.onset_tick);
            }
            if symbol.has_tail() && measure.contains(note.offset_tick) {
                grid_ticks.push(note.offset_tick);
            }
        }
        let measure_tempos: Vec<_> = tempo_changes
            .iter()
            .filter(|t| measure.contains(t.tick))
            .collect();
        grid_ticks.extend(measure_tempos.iter().map(|t| t.tick));

        let resolution = resolve_grid(measure, &grid_ticks, options.grid);

        let mut cells: Vec<(u64, Cell)> = Vec::new();
        for (note, symbol) in &classified {
            if measure.contains(note.onset_tick) {
                let position = snap_reporting(measure, resolution, note.onset_tick, collector);
                place_cell(&mut cells, position, Cell::Start(*symbol));
            }
            if symbol.has_tail() && measure.contains(note.offset_tick) {
                let position = snap_reporting(measure, resolution, note.offset_tick, collector);
                place_cell(&mut cells, position, Cell::Tail);
            }
        }
        cells.sort_by_key(|(position, _)| *position);

        let measure_tempos = measure_tempos
            .iter()
            .map(|t| {
                let (position, _) = snap_to_grid(measure, resolution, t.tick);
                (position, t.bpm())
            })
            .collect();

        let signature = match previous_signature {
            Some(sig) if sig == (measure.numerator, measure.denominator) => None,
            _ => Some((measure.numerator, measure.denominator)),
        };
        previous_signature = Some((measure.numerator, measure.denominator));

        chart_measures.push(ChartMeasure {
            measure: *measure,
            resolution,
            cells,
            tempo_changes: measure_tempos,
            signature,
        });
    }

    Chart {
        channel: lane.channel,
        lane_index: lane.lane_index,
        balloons,
        measures: chart_measures,
    }
}

/// Insert a cell, letting a later event overwrite an earlier one that was
/// rounded onto the same grid line.
fn place_cell(cells: &mut Vec<(u64, Cell)>, position: u64, cell: Cell) {
    match cells.iter_mut().find(|(p, _)| *p == position) {
        Some(slot) => slot.1 = cell,
        None => cells.push((position, cell)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{TempoChange, TimeSignatureChange};
    use pretty_assertions::assert_eq;

    fn context(tempos: &[(u64, u32)], sigs: &[(u64, u8, u16)]) -> TimingContext {
        TimingContext {
            ppq: 480,
            tempo_changes: tempos
                .iter()
                .map(|&(tick, microseconds_per_beat)| TempoChange {
                    tick,
                    microseconds_per_beat,
                })
                .collect(),
            time_signatures: sigs
                .iter()
                .map(|&(tick, numerator, denominator)| TimeSignatureChange {
                    tick,
                    numerator,
                    denominator,
                })
                .collect(),
            last_tick: 0,
        }
    }

    fn hit_note(onset: u64) -> TimedNote {
        TimedNote {
            onset_tick: onset,
            offset_tick: onset,
            pitch: 60,
            velocity: 100,
            channel: 0,
            track_index: 0,
        }
    }

    fn hit_options() -> ConvertOptions {
        ConvertOptions {
            code: NoteCode::new('1').unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn hits_land_on_minimal_grid() {
        let notes = vec![hit_note(0), hit_note(240), hit_note(360)];
        let ctx = context(&[(0, 500_000)], &[(0, 4, 4)]);
        let result = convert(&notes, &ctx, &hit_options()).unwrap();
        assert!(result.feedback.is_empty());

        let chart = &result.value.charts[0];
        assert_eq!(chart.measures.len(), 1);
        let m = &chart.measures[0];
        assert_eq!(m.resolution, 16);
        let positions: Vec<u64> = m.cells.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![0, 2, 3]);
    }

    #[test]
    fn empty_input_still_produces_one_chart() {
        let ctx = context(&[(0, 500_000)], &[(0, 4, 4)]);
        let result = convert(&[], &ctx, &hit_options()).unwrap();
        assert_eq!(result.value.charts.len(), 1);
        // timing events at tick 0 keep one measure alive
        assert_eq!(result.value.charts[0].measures.len(), 1);
        assert!(result.value.charts[0].cells_total() == 0);
    }

    #[test]
    fn no_events_at_all_degrades_to_empty_chart() {
        let ctx = context(&[], &[]);
        let result = convert(&[], &ctx, &hit_options()).unwrap();
        assert_eq!(result.value.charts.len(), 1);
        assert!(result.value.charts[0].measures.is_empty());
        assert_eq!(result.value.initial_bpm, 120.0);
    }

    #[test]
    fn overlapping_notes_split_into_two_charts() {
        let mut a = hit_note(0);
        a.offset_tick = 200;
        let mut b = hit_note(100);
        b.offset_tick = 300;
        let ctx = context(&[(0, 500_000)], &[(0, 4, 4)]);
        let options = ConvertOptions {
            code: NoteCode::new('5').unwrap(),
            ..Default::default()
        };
        let result = convert(&[a, b], &ctx, &options).unwrap();
        assert_eq!(result.value.charts.len(), 2);
    }

    #[test]
    fn roll_tail_lands_in_following_measure() {
        let mut note = hit_note(0);
        note.offset_tick = 2400; // tail halfway through measure 1
        let ctx = context(&[(0, 500_000)], &[(0, 4, 4)]);
        let options = ConvertOptions {
            code: NoteCode::new('5').unwrap(),
            ..Default::default()
        };
        let result = convert(&[note], &ctx, &options).unwrap();

        let chart = &result.value.charts[0];
        assert_eq!(chart.measures.len(), 2);
        assert_eq!(chart.measures[0].cells, vec![(0, Cell::Start(NoteSymbol::Roll(options.code)))]);
        assert_eq!(chart.measures[1].cells, vec![(1, Cell::Tail)]);
        assert_eq!(chart.measures[1].resolution, 4);
    }

    #[test]
    fn balloon_counts_follow_note_order() {
        let mut first = hit_note(0);
        first.offset_tick = 960; // 1 s at 120 BPM
        first.pitch = 69;
        let mut second = hit_note(1920);
        second.offset_tick = 2400; // 0.5 s
        second.pitch = 69;
        let ctx = context(&[(0, 500_000)], &[(0, 4, 4)]);
        let result = convert(&[first, second], &ctx, &ConvertOptions::default()).unwrap();

        let chart = &result.value.charts[0];
        assert_eq!(chart.balloons.len(), 2);
        assert!(chart.balloons[0] > chart.balloons[1]);
    }

    #[test]
    fn mid_measure_tempo_change_is_grid_placed() {
        let notes = vec![hit_note(0), hit_note(480)];
        let ctx = context(&[(0, 500_000), (960, 250_000)], &[(0, 4, 4)]);
        let result = convert(&notes, &ctx, &hit_options()).unwrap();

        let m = &result.value.charts[0].measures[0];
        assert_eq!(m.resolution, 4);
        assert_eq!(m.tempo_changes, vec![(2, 240.0)]);
    }

    #[test]
    fn signature_marker_set_on_change_only() {
        let notes = vec![hit_note(0), hit_note(2000), hit_note(4000)];
        let ctx = context(&[(0, 500_000)], &[(0, 4, 4), (960, 3, 4)]);
        let result = convert(&notes, &ctx, &hit_options()).unwrap();

        let chart = &result.value.charts[0];
        assert_eq!(chart.measures[0].signature, Some((4, 4)));
        assert_eq!(chart.measures[1].signature, Some((3, 4)));
        assert_eq!(chart.measures[2].signature, None);
    }

    #[test]
    fn quantization_loss_is_reported_not_fatal() {
        // tick 1 cannot sit on any grid ≤ 192 in a 1920-tick measure
        let notes = vec![hit_note(0), hit_note(1), hit_note(480)];
        let ctx = context(&[(0, 500_000)], &[(0, 4, 4)]);
        let result = convert(&notes, &ctx, &hit_options()).unwrap();
        assert_eq!(result.warnings().count(), 1);
        assert_eq!(result.value.charts[0].measures.len(), 1);
    }

    impl Chart {
        fn cells_total(&self) -> usize {
            self.measures.iter().map(|m| m.cells.len()).sum()
        }
    }
}
