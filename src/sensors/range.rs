//! Median-filtered distance sampling over the pulse-echo transducer.
//!
//! A single HC-SR04 pulse is noisy: sloshing water, condensation on the
//! horn and multi-path echoes off the tank wall all produce outliers. One
//! measurement therefore takes a burst of pulses and reports the median of
//! the plausible ones.

use heapless::Vec;
use log::warn;

use crate::app::ports::RangeTransducer;

/// Microseconds of round trip to centimetres of distance, at ~20 degC
/// (343 m/s, halved for the round trip).
pub const US_TO_CM: f32 = 0.017_15;

/// Echoes shorter than this are ringing artifacts.
const MIN_PLAUSIBLE_CM: f32 = 0.0;

/// HC-SR04 range ceiling; beyond it the echo is a stray reflection.
const MAX_PLAUSIBLE_CM: f32 = 500.0;

/// Hard cap on the burst length, independent of configuration.
pub const MAX_BURST: usize = 30;

/// Takes bursts of pulse-echo samples and reduces them to one distance.
pub struct RangeSampler<T: RangeTransducer> {
    transducer: T,
}

impl<T: RangeTransducer> RangeSampler<T> {
    pub fn new(transducer: T) -> Self {
        Self { transducer }
    }

    /// Measure the distance to the water surface in centimetres.
    ///
    /// Fires up to `burst` pulses (clamped to [`MAX_BURST`]) with a settle
    /// pause between them, discards timeouts and implausible echoes, and
    /// returns the median of what is left. `None` when every sample in the
    /// burst was rejected.
    pub fn measure_cm(&mut self, burst: u8) -> Option<f32> {
        let burst = (burst.max(1) as usize).min(MAX_BURST);
        let mut accepted: Vec<f32, MAX_BURST> = Vec::new();
        let mut rejected = 0u8;

        for i in 0..burst {
            if i > 0 {
                self.transducer.settle();
            }
            match self.transducer.trigger_pulse_and_measure() {
                Some(round_trip_us) => {
                    let cm = round_trip_us as f32 * US_TO_CM;
                    if cm > MIN_PLAUSIBLE_CM && cm < MAX_PLAUSIBLE_CM {
                        let _ = accepted.push(cm);
                    } else {
                        rejected += 1;
                    }
                }
                None => rejected += 1,
            }
        }

        if accepted.is_empty() {
            warn!("range: all {} samples rejected", burst);
            return None;
        }
        if rejected > 0 {
            warn!(
                "range: {}/{} samples rejected in burst",
                rejected, burst
            );
        }
        Some(median(&mut accepted))
    }
}

/// Median of a non-empty slice; even lengths average the middle pair.
fn median(samples: &mut [f32]) -> f32 {
    samples.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len() % 2 == 1 {
        samples[mid]
    } else {
        (samples[mid - 1] + samples[mid]) / 2.0
    }
}
