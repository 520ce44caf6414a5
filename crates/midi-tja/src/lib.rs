//! MIDI to TJA chart conversion.
//!
//! Converts a tick-indexed MIDI performance into measure-structured TJA chart
//! data, and independently reclocks a MIDI file to a new tick resolution while
//! preserving real playback time.
//!
//! Pipeline: [`extract::extract_events`] → [`tempo::TempoMap`] →
//! [`measure::segment_measures`] → [`split::split_lanes`] →
//! [`classify`]/[`grid`] → [`convert::convert`] → [`render::render_tja`].
//! Reclocking ([`rescale`]) is a parallel transform over the raw event list.

pub mod classify;
pub mod convert;
pub mod extract;
pub mod feedback;
pub mod grid;
pub mod measure;
pub mod note;
pub mod render;
pub mod rescale;
pub mod split;
pub mod tempo;

pub use classify::{BalloonTable, NoteCode, NoteSymbol};
pub use convert::{convert, Cell, Chart, ChartMeasure, Conversion, ConvertOptions};
pub use extract::{extract_events, TempoChange, TimeSignatureChange, TimingContext};
pub use feedback::{ConvertResult, Feedback, FeedbackCollector, FeedbackLevel};
pub use grid::{resolve_grid, snap_to_grid, GridOptions};
pub use measure::{segment_measures, Measure};
pub use note::TimedNote;
pub use render::{render_tja, RenderOptions};
pub use rescale::{rescale_smf, rescale_tempo, rescale_tick, RescaleParams};
pub use split::{split_lanes, Lane};
pub use tempo::{TempoMap, TimingDefaults};

/// Errors from MIDI/TJA conversion operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),
    #[error("invalid tempo map: {0}")]
    InvalidTempoMap(String),
    #[error("invalid rescale: {0}")]
    InvalidRescale(String),
    #[error("unknown TJA note code: {0:?}")]
    UnknownNoteCode(char),
}

pub type Result<T> = std::result::Result<T, Error>;
