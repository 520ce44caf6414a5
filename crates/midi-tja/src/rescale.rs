//! Tick rescaling: change a file's PPQ and/or playback rate while keeping
//! the tick→time map consistent.
//!
//! Absolute ticks scale by `new_ppq / old_ppq` and every tempo value divides
//! by the rate, so elapsed time at corresponding ticks equals the original
//! divided by the rate. Deltas are re-derived from rescaled absolute ticks;
//! per-delta rounding therefore never accumulates.

use crate::{Error, Result};
use midly::num::{u15, u24, u28};
use midly::{MetaMessage, Smf, Timing, TrackEventKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaleParams {
    pub new_ppq: u16,
    /// Playback rate multiplier: 2.0 halves every tempo value (plays twice
    /// as fast), 1.0 keeps real time identical.
    pub rate: f64,
}

impl RescaleParams {
    fn validate(&self) -> Result<()> {
        if self.new_ppq == 0 {
            return Err(Error::InvalidRescale("new PPQ must be positive".into()));
        }
        if !self.rate.is_finite() || self.rate <= 0.0 {
            return Err(Error::InvalidRescale(format!(
                "rate must be a positive number, got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

/// Map an absolute tick onto the new resolution, rounding half up.
pub fn rescale_tick(tick: u64, old_ppq: u16, new_ppq: u16) -> u64 {
    let scaled = tick as u128 * new_ppq as u128;
    ((scaled + old_ppq as u128 / 2) / old_ppq as u128) as u64
}

/// Divide a tempo value by the rate, keeping it at least 1.
pub fn rescale_tempo(microseconds_per_beat: u32, rate: f64) -> u32 {
    let scaled = (microseconds_per_beat as f64 / rate).round();
    (scaled.max(1.0).min(u32::MAX as f64)) as u32
}

/// Rescale a parsed SMF in place: header timing, every delta, every tempo.
pub fn rescale_smf(smf: &mut Smf, params: RescaleParams) -> Result<()> {
    params.validate()?;

    let old_ppq = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(_, _) => {
            return Err(Error::InvalidRescale(
                "SMPTE timecode files have no PPQ to rescale".into(),
            ));
        }
    };
    if old_ppq == 0 {
        return Err(Error::InvalidRescale("source PPQ must be positive".into()));
    }

    for track in &mut smf.tracks {
        let mut old_abs: u64 = 0;
        let mut new_last: u64 = 0;
        for event in track.iter_mut() {
            old_abs += event.delta.as_int() as u64;
            let new_abs = rescale_tick(old_abs, old_ppq, params.new_ppq);
            let delta = (new_abs - new_last).min(0x0FFF_FFFF); // u28 ceiling
            event.delta = u28::new(delta as u32);
            new_last = new_abs;

            if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                let rescaled = rescale_tempo(tempo.as_int(), params.rate).min(0x00FF_FFFF);
                event.kind = TrackEventKind::Meta(MetaMessage::Tempo(u24::new(rescaled)));
            }
        }
    }

    smf.header.timing = Timing::Metrical(u15::new(params.new_ppq.min(0x7FFF)));
    tracing::debug!(old_ppq, new_ppq = params.new_ppq, rate = params.rate, "rescaled SMF");
    Ok(())
}
