//! Conversion feedback (warnings and infos).
//!
//! Conversion is best-effort: per-note anomalies such as quantization loss or
//! an unmapped balloon pitch are collected as feedback and reported alongside
//! the output instead of aborting the run.

use serde::{Deserialize, Serialize};

/// One recoverable anomaly encountered during conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
    /// Absolute tick the anomaly refers to, when known.
    pub tick: Option<u64>,
    /// Measure index the anomaly refers to, when known.
    pub measure: Option<usize>,
}

impl Feedback {
    pub fn warning(message: impl Into<String>) -> Self {
        Feedback {
            level: FeedbackLevel::Warning,
            message: message.into(),
            tick: None,
            measure: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Feedback {
            level: FeedbackLevel::Info,
            message: message.into(),
            tick: None,
            measure: None,
        }
    }

    pub fn at_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    pub fn in_measure(mut self, measure: usize) -> Self {
        self.measure = Some(measure);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackLevel {
    /// Converted with assumptions, output may not match the performance exactly
    Warning,
    /// Minor note, no fidelity impact
    Info,
}

/// Collector threaded through the conversion pipeline.
#[derive(Debug, Default)]
pub struct FeedbackCollector {
    feedback: Vec<Feedback>,
}

impl FeedbackCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feedback: Feedback) {
        self.feedback.push(feedback);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.feedback.push(Feedback::warning(message));
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    pub fn into_feedback(self) -> Vec<Feedback> {
        self.feedback
    }
}

/// A conversion value together with the feedback gathered while producing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertResult<T> {
    pub value: T,
    pub feedback: Vec<Feedback>,
}

impl<T> ConvertResult<T> {
    pub fn new(value: T, feedback: Vec<Feedback>) -> Self {
        ConvertResult { value, feedback }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Feedback> {
        self.feedback
            .iter()
            .filter(|f| f.level == FeedbackLevel::Warning)
    }
}
