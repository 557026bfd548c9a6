//! Dynamics processing for the monitor output
//!
//! A downward expander acts as the noise gate on the mixed stereo feed:
//! levels below the threshold are pushed further down along a power-law
//! transfer curve, levels at or above it pass at the fixed output ceiling.

use sf_core::Sample;

use crate::{Processor, StereoProcessor};

/// Tiny DC offset added to the detector, keeps the envelope out of denormal
/// range during silence
const DENORMAL_OFFSET: Sample = 1e-29;

/// Smallest usable threshold
const MIN_THRESHOLD: Sample = 1e-12;

/// Smallest usable time constant, in samples
const MIN_TIME_CONSTANT: Sample = 1e-3;

/// Downward expander with peak-linked stereo detection
///
/// The detector takes the louder of the two channels, so both channels ride
/// the same gain and the stereo image never tilts. Attack and release time
/// constants are expressed directly in samples, like the rest of the
/// block-level arithmetic in this pipeline.
///
/// Samples must be processed in time order: the envelope and gain are
/// one-pole filter states that persist across blocks.
#[derive(Debug, Clone)]
pub struct Expander {
    threshold: Sample,
    ceiling: Sample,

    // Transfer curve below threshold: gain = env^transfer_a * transfer_b
    transfer_a: Sample,
    transfer_b: Sample,

    // Smoothing coefficients
    attack_coeff: Sample,
    release_coeff: Sample,
    envelope_decay: Sample,

    // Filter state
    env: Sample,
    gain: Sample,
}

impl Expander {
    pub fn new() -> Self {
        let mut expander = Self {
            threshold: 1.0,
            ceiling: 1.0,
            transfer_a: 0.0,
            transfer_b: 1.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope_decay: 0.0,
            env: 0.0,
            gain: 1.0,
        };
        expander.set_attack(1.0);
        expander.set_release(1.0);
        expander.set_ratio(1.2);
        expander
    }

    /// Set the threshold in linear amplitude units
    pub fn set_threshold(&mut self, value: Sample) {
        self.threshold = value.max(MIN_THRESHOLD);
        self.transfer_b = self.ceiling * self.threshold.powf(-self.transfer_a);
    }

    /// Set the expansion slope; values above 1.0 reduce gain below threshold
    pub fn set_ratio(&mut self, value: Sample) {
        self.transfer_a = value.max(1.0) - 1.0;
        self.transfer_b = self.ceiling * self.threshold.powf(-self.transfer_a);
    }

    /// Set the attack time constant in samples (applied while gain falls)
    pub fn set_attack(&mut self, samples: Sample) {
        self.attack_coeff = (-1.0 / samples.max(MIN_TIME_CONSTANT)).exp();
    }

    /// Set the release time constant in samples (applied while gain recovers)
    ///
    /// The envelope decays four times faster than the gain releases, so the
    /// detector lets go of a transient before the gain does.
    pub fn set_release(&mut self, samples: Sample) {
        let t = samples.max(MIN_TIME_CONSTANT);
        self.release_coeff = (-1.0 / t).exp();
        self.envelope_decay = (-4.0 / t).exp();
    }

    #[inline]
    pub fn threshold(&self) -> Sample {
        self.threshold
    }

    /// Currently applied gain
    #[inline]
    pub fn gain(&self) -> Sample {
        self.gain
    }
}

impl Default for Expander {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Expander {
    fn reset(&mut self) {
        self.env = 0.0;
        self.gain = 1.0;
    }
}

impl StereoProcessor for Expander {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let det = left.abs().max(right.abs()) + DENORMAL_OFFSET;

        // Fast rise, slow fall
        self.env = if det >= self.env {
            det
        } else {
            det + self.envelope_decay * (self.env - det)
        };

        let target = if self.env < self.threshold {
            self.env.powf(self.transfer_a) * self.transfer_b
        } else {
            self.ceiling
        };

        // Clamp down at attack speed, recover at release speed
        self.gain = if target < self.gain {
            target + self.attack_coeff * (self.gain - target)
        } else {
            target + self.release_coeff * (self.gain - target)
        };

        (left * self.gain, right * self.gain)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn unity_above_threshold() {
        let mut expander = Expander::new();
        expander.set_threshold(0.1);

        let mut out = (0.0, 0.0);
        for _ in 0..1000 {
            out = expander.process_sample(0.5, 0.5);
        }

        assert_abs_diff_eq!(out.0, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(out.1, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(expander.gain(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn attenuates_below_threshold() {
        let mut expander = Expander::new();
        expander.set_threshold(0.5);
        expander.set_ratio(2.0);

        let mut out = (0.0, 0.0);
        for _ in 0..10_000 {
            out = expander.process_sample(0.1, 0.1);
        }

        // ratio 2.0 below a 0.5 threshold: gain = env * ceiling / threshold
        assert_abs_diff_eq!(expander.gain(), 0.2, epsilon = 1e-3);
        assert!(out.0 < 0.1);
        assert!(out.0 > 0.0);
    }

    #[test]
    fn transfer_continuous_at_threshold() {
        // Just below the threshold the curve must land next to the ceiling,
        // whatever order the parameters were set in.
        for (threshold, ratio) in [(0.25, 1.2), (0.8, 3.0)] {
            let mut a = Expander::new();
            a.set_ratio(ratio);
            a.set_threshold(threshold);

            let mut b = Expander::new();
            b.set_threshold(threshold);
            b.set_ratio(ratio);

            for expander in [&mut a, &mut b] {
                let level = threshold * 0.99;
                for _ in 0..1_000 {
                    expander.process_sample(level, level);
                }
                let expected = 0.99_f64.powf(ratio - 1.0);
                assert_abs_diff_eq!(expander.gain(), expected, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn gain_recovers_after_transient() {
        let mut expander = Expander::new();
        expander.set_threshold(0.2);
        expander.set_ratio(2.0);
        expander.set_attack(5.0);
        expander.set_release(20.0);

        // Quiet stretch pulls the gain down
        for _ in 0..5_000 {
            expander.process_sample(0.01, 0.01);
        }
        assert!(expander.gain() < 0.5);

        // Loud signal brings it back to unity within a handful of release
        // time constants
        for _ in 0..500 {
            expander.process_sample(0.5, 0.5);
        }
        assert_abs_diff_eq!(expander.gain(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn silence_stays_finite() {
        let mut expander = Expander::new();
        expander.set_threshold(0.05);

        for _ in 0..100_000 {
            let (l, r) = expander.process_sample(0.0, 0.0);
            assert!(l.is_finite());
            assert!(r.is_finite());
            assert_eq!(l, 0.0);
        }
        assert!(expander.gain().is_finite());
    }

    #[test]
    fn degenerate_parameters_clamp() {
        let mut expander = Expander::new();
        expander.set_threshold(-1.0);
        expander.set_attack(0.0);
        expander.set_release(-5.0);

        let (l, r) = expander.process_sample(0.3, 0.3);
        assert!(l.is_finite());
        assert!(r.is_finite());
        assert_eq!(expander.threshold(), 1e-12);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut expander = Expander::new();
        expander.set_threshold(0.5);
        for _ in 0..1_000 {
            expander.process_sample(0.01, 0.01);
        }
        assert!(expander.gain() < 1.0);

        expander.reset();
        assert_eq!(expander.gain(), 1.0);
    }

    #[test]
    fn detector_is_peak_linked() {
        let mut loud_left = Expander::new();
        loud_left.set_threshold(0.2);
        let mut loud_right = loud_left.clone();

        // Mirrored inputs must produce mirrored gains
        for _ in 0..2_000 {
            let (ll, lr) = loud_left.process_sample(0.5, 0.05);
            let (rl, rr) = loud_right.process_sample(0.05, 0.5);
            assert_abs_diff_eq!(ll, rr, epsilon = 1e-12);
            assert_abs_diff_eq!(lr, rl, epsilon = 1e-12);
        }
    }
}
