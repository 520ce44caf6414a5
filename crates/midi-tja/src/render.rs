//! TJA text rendering: quantized charts → chart file body.
//!
//! One comma-terminated cell row per measure, `0` for empty cells,
//! `#MEASURE`/`#BPMCHANGE` directives where the timing changes. The renderer
//! is a thin formatter over [`Conversion`]; all timing decisions were made
//! upstream.

use crate::convert::{ChartMeasure, Conversion};
use std::fmt::Write;

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Value of the `TITLE:` header, typically the source file name.
    pub title: String,
    /// Leading `// ...` comment line, typically the producing tool.
    pub comment: Option<String>,
}

/// Render a conversion as a complete TJA file body.
pub fn render_tja(conversion: &Conversion, options: &RenderOptions) -> String {
    let mut out = String::new();

    if let Some(comment) = &options.comment {
        writeln!(out, "// {comment}").unwrap();
    }
    writeln!(out, "TITLE:{}", options.title).unwrap();
    writeln!(out, "BPM:{}", conversion.initial_bpm).unwrap();
    writeln!(out, "OFFSET:0").unwrap();

    for chart in &conversion.charts {
        writeln!(out).unwrap();
        writeln!(out).unwrap();
        writeln!(out, "// Channel {}, lane {}", chart.channel, chart.lane_index).unwrap();

        if !chart.balloons.is_empty() {
            let counts: Vec<String> = chart.balloons.iter().map(u32::to_string).collect();
            writeln!(out, "BALLOON:{}", counts.join(",")).unwrap();
            writeln!(out).unwrap();
        }

        writeln!(out, "#START").unwrap();
        for measure in &chart.measures {
            render_measure(&mut out, measure);
        }
        writeln!(out, "#END").unwrap();
    }

    out
}

fn render_measure(out: &mut String, measure: &ChartMeasure) {
    if let Some((numerator, denominator)) = measure.signature {
        writeln!(out, "#MEASURE {numerator}/{denominator}").unwrap();
    }

    // An empty measure is just its terminating comma
    if measure.cells.is_empty() && measure.tempo_changes.is_empty() {
        writeln!(out, ",").unwrap();
        return;
    }

    let mut cells = measure.cells.iter().peekable();
    let mut tempos = measure.tempo_changes.iter().peekable();
    let mut mid_row = false;

    for position in 0..measure.resolution {
        while let Some((_, bpm)) = tempos.next_if(|(p, _)| *p <= position) {
            if mid_row {
                out.push('\n');
                mid_row = false;
            }
            writeln!(out, "#BPMCHANGE {bpm}").unwrap();
        }
        let ch = match cells.next_if(|(p, _)| *p <= position) {
            Some((_, cell)) => cell.as_char(),
            None => '0',
        };
        out.push(ch);
        mid_row = true;
    }
    writeln!(out, ",").unwrap();
}
