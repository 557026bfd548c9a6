//! The monitor mixer: block-size bridge between acquisition and playback
//!
//! The acquisition side pushes raw multi-channel blocks at its own pace; the
//! sound device pulls a fixed number of stereo samples per cycle. Each cycle
//! runs five phases: drain last cycle's leftovers, pick the monitored
//! channel, fill the remaining output capacity from the raw block, carry the
//! orphaned tail into the overflow ring, then run the expander over the
//! finished block. The cycle path performs no allocation, locking, logging,
//! or I/O.

use std::sync::Arc;

use sf_core::{AudioBuffer, ChannelSource, FULL_SCALE, MultiBuffer, Sample, StereoBuffer};
use sf_dsp::StereoProcessor;
use sf_dsp::dynamics::Expander;

use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::meters::OutputMeters;
use crate::overflow::OverflowRing;
use crate::registry::ChannelRegistry;

/// Headroom applied to the user-facing 0..10-ish volume control
const VOLUME_SCALE: Sample = 0.1;

/// Floor for negotiated sample rates
const MIN_SAMPLE_RATE: f64 = 1.0;

/// Per-sample base of the meter peak decay
const METER_DECAY_BASE: f64 = 0.9995;

/// Stereo monitor mixer over N acquisition channels
///
/// Owned by the audio thread. Registry and parameter mutation arrive only
/// between cycles (the control layer drains its command queue at the top of
/// each cycle); attach and rate changes are topology-time calls serialized
/// by the host.
pub struct MonitorMixer {
    registry: ChannelRegistry,
    ring: OverflowRing,
    expander: Expander,
    meters: Arc<OutputMeters>,

    /// User volume after headroom scaling
    volume: Sample,
    /// Acquisition-side rate as of the last negotiation
    core_sample_rate: f64,
    /// Stereo samples owed to the consumer each cycle
    samples_expected: usize,
    /// Peak decay per block, recomputed with `samples_expected`
    meter_decay: f64,
}

impl MonitorMixer {
    pub fn new(config: MonitorConfig) -> MonitorResult<Self> {
        config.validate()?;
        log::info!(
            "monitor mixer: {} input slots, {}-sample overflow, {} samples/cycle",
            config.max_channels,
            config.overflow_capacity,
            config.samples_expected
        );
        let mut mixer = Self {
            registry: ChannelRegistry::new(config.max_channels),
            ring: OverflowRing::new(config.overflow_capacity),
            expander: Expander::new(),
            meters: Arc::new(OutputMeters::default()),
            volume: VOLUME_SCALE,
            core_sample_rate: config.core_sample_rate,
            samples_expected: config.samples_expected,
            meter_decay: 1.0,
        };
        mixer.meter_decay = METER_DECAY_BASE.powf(mixer.samples_expected as f64);
        Ok(mixer)
    }

    /// Bind an upstream channel; fails only past the configured capacity
    pub fn attach(&mut self, source: ChannelSource) -> MonitorResult<usize> {
        self.registry.attach(source)
    }

    /// Toggle a channel's contribution to the mix
    pub fn set_channel_monitored(&mut self, index: usize, monitored: bool) {
        self.registry.set_monitored(index, monitored);
    }

    /// Set the user volume level
    pub fn set_output_volume(&mut self, volume: Sample) {
        self.volume = volume * VOLUME_SCALE;
    }

    /// Set the noise gate threshold, in the microvolt-equivalent units the
    /// control surface has always used
    pub fn set_noise_gate_threshold(&mut self, threshold: Sample) {
        self.expander.set_threshold(threshold);
    }

    /// Renegotiate the per-cycle output target
    ///
    /// In-flight overflow is not reconciled across a rate change: both
    /// buffers are cleared. The expander keeps its state; it is a continuous
    /// filter, and resetting it would put a gain step on the output at every
    /// device renegotiation.
    pub fn on_rate_change(&mut self, core_rate: f64, device_rate: f64, device_block: usize) {
        let core = clamp_rate(core_rate);
        let device = clamp_rate(device_rate);
        self.core_sample_rate = core;
        self.samples_expected = (core / device * device_block as f64).floor() as usize + 1;
        self.meter_decay = METER_DECAY_BASE.powf(self.samples_expected as f64);
        self.ring.reset();
        log::info!(
            "monitor rate change: core {core} Hz, device {device} Hz, block {device_block} -> {} samples/cycle",
            self.samples_expected
        );
    }

    /// Topology change: drop all descriptors and in-flight overflow
    pub fn reset_connections(&mut self) {
        self.registry.reset();
        self.ring.reset();
        self.meters.reset();
        log::debug!("monitor connections reset");
    }

    #[inline]
    pub fn samples_expected(&self) -> usize {
        self.samples_expected
    }

    #[inline]
    pub fn core_sample_rate(&self) -> f64 {
        self.core_sample_rate
    }

    pub fn meters(&self) -> Arc<OutputMeters> {
        Arc::clone(&self.meters)
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Run one cycle: consume up to `n_samples` raw samples from `input`,
    /// produce exactly `samples_expected` stereo samples into `out`
    ///
    /// Returns the produced count, which is also the count of raw samples
    /// the caller should consider consumed; callers depend on that
    /// reassignment to pace the acquisition side. `out` must hold at least
    /// `samples_expected` samples.
    pub fn process_cycle(
        &mut self,
        input: &MultiBuffer,
        n_samples: usize,
        out: &mut StereoBuffer,
    ) -> usize {
        debug_assert!(out.len() >= self.samples_expected);
        let expected = self.samples_expected.min(out.len());
        let n_samples = n_samples.min(input.len());
        out.clear();

        let (drain, fill) = self.ring.begin_cycle();

        // Phase 1: leftovers first, whether or not anything is monitored.
        let copied = drain.valid_samples().min(expected);
        out.left_mut()[..copied].copy_from_slice(&drain.left()[..copied]);
        out.right_mut()[..copied].copy_from_slice(&drain.right()[..copied]);

        // Leftovers the consumer still did not take are carried forward
        // again. This always fits: the remainder is at most one capacity.
        fill.append(
            &drain.left()[copied..drain.valid_samples()],
            &drain.right()[copied..drain.valid_samples()],
        );

        // Phases 2-4: one pass over the monitored channels in priority
        // order. Only the first one reaches the output; every monitored
        // channel carries its own orphaned tail, summed at the shared
        // post-drain offset.
        let remaining = expected - copied;
        let mixed = remaining.min(n_samples);
        let orphaned = n_samples - mixed;
        let base = fill.valid_samples();
        let orphans_fit = base + orphaned < fill.capacity();

        let mut selected = false;
        let mut overrun = false;
        for descriptor in self.registry.monitored() {
            let Some(raw) = input.channel(descriptor.slot()) else {
                continue;
            };
            let gain = self.volume / (FULL_SCALE * descriptor.source().calibration());

            if !selected {
                selected = true;
                let (out_l, out_r) = out.channels_mut();
                for (o, &s) in out_l[copied..copied + mixed].iter_mut().zip(&raw[..mixed]) {
                    *o += s * gain;
                }
                for (o, &s) in out_r[copied..copied + mixed].iter_mut().zip(&raw[..mixed]) {
                    *o += s * gain;
                }
            }

            if orphaned > 0 {
                if orphans_fit {
                    fill.accumulate(base, &raw[mixed..n_samples], gain);
                } else {
                    overrun = true;
                }
            }
        }

        let fill_count = if overrun {
            // Overrun drop: the fill buffer restarts empty, never partially
            // filled and never written out of bounds.
            0
        } else if selected {
            base + orphaned
        } else {
            // Nothing monitored: the raw input is dropped, leftovers stand.
            base
        };

        // Phase 5: dynamics over the finished block.
        let (out_l, out_r) = out.channels_mut();
        self.expander
            .process_block(&mut out_l[..expected], &mut out_r[..expected]);

        self.update_meters(&out_l[..expected], &out_r[..expected]);
        self.ring.end_cycle(fill_count);
        expected
    }

    fn update_meters(&self, left: &[Sample], right: &[Sample]) {
        if left.is_empty() {
            return;
        }
        let mut peak_l = self.meters.left_peak() * self.meter_decay;
        let mut peak_r = self.meters.right_peak() * self.meter_decay;
        let mut sum_sq_l = 0.0;
        let mut sum_sq_r = 0.0;

        for (&l, &r) in left.iter().zip(right) {
            let (al, ar) = (l.abs(), r.abs());
            peak_l = peak_l.max(al);
            peak_r = peak_r.max(ar);
            sum_sq_l += l * l;
            sum_sq_r += r * r;
            if al > 1.0 || ar > 1.0 {
                self.meters.mark_clipped();
            }
        }

        self.meters.set_left_peak(peak_l);
        self.meters.set_right_peak(peak_r);
        self.meters.set_left_rms((sum_sq_l / left.len() as f64).sqrt());
        self.meters.set_right_rms((sum_sq_r / right.len() as f64).sqrt());
    }
}

fn clamp_rate(rate: f64) -> f64 {
    if rate.is_finite() {
        rate.max(MIN_SAMPLE_RATE)
    } else {
        MIN_SAMPLE_RATE
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    /// Calibration that cancels the full-scale normalization, so raw sample
    /// values pass straight through at volume 10.0
    const UNIT_BIT_VOLTS: Sample = 1.0 / FULL_SCALE;

    fn test_mixer(samples_expected: usize, overflow_capacity: usize) -> MonitorMixer {
        let config = MonitorConfig {
            max_channels: 16,
            overflow_capacity,
            core_sample_rate: 44_100.0,
            samples_expected,
        };
        let mut mixer = MonitorMixer::new(config).unwrap();
        mixer.set_output_volume(10.0);
        mixer.set_noise_gate_threshold(0.01);
        mixer
    }

    fn attach_monitored(mixer: &mut MonitorMixer) -> usize {
        let index = mixer.attach(ChannelSource::new(0, UNIT_BIT_VOLTS)).unwrap();
        mixer.set_channel_monitored(index, true);
        index
    }

    fn fill_channel(input: &mut MultiBuffer, slot: usize, value: Sample) {
        for s in input.channel_mut(slot).unwrap() {
            *s = value;
        }
    }

    #[test]
    fn output_is_fixed_length_for_any_input() {
        let mut mixer = test_mixer(8, 100);
        attach_monitored(&mut mixer);

        let input = MultiBuffer::new(4, 32);
        let mut out = StereoBuffer::new(8);

        assert_eq!(mixer.process_cycle(&input, 0, &mut out), 8);
        assert_eq!(mixer.process_cycle(&input, 3, &mut out), 8);
        assert_eq!(mixer.process_cycle(&input, 32, &mut out), 8);
    }

    #[test]
    fn unmonitored_channels_produce_silence() {
        let mut mixer = test_mixer(8, 100);
        mixer.attach(ChannelSource::new(0, UNIT_BIT_VOLTS)).unwrap();

        let mut input = MultiBuffer::new(4, 16);
        fill_channel(&mut input, 2, 0.9);
        let mut out = StereoBuffer::new(8);

        for _ in 0..4 {
            mixer.process_cycle(&input, 16, &mut out);
            assert!(out.left().iter().all(|&s| s == 0.0));
            assert!(out.right().iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn gain_applies_volume_and_calibration() {
        let mut mixer = test_mixer(4, 100);
        let index = mixer.attach(ChannelSource::new(0, 2.0 / FULL_SCALE)).unwrap();
        mixer.set_channel_monitored(index, true);

        let mut input = MultiBuffer::new(4, 4);
        fill_channel(&mut input, 2, 0.8);
        let mut out = StereoBuffer::new(4);
        mixer.process_cycle(&input, 4, &mut out);

        // volume 10.0 scales to 1.0; calibration halves the result
        assert_abs_diff_eq!(out.left()[0], 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(out.right()[0], 0.4, epsilon = 1e-12);
    }

    #[test]
    fn only_first_monitored_channel_reaches_output() {
        let mut mixer = test_mixer(4, 100);
        let a = mixer.attach(ChannelSource::new(0, UNIT_BIT_VOLTS)).unwrap();
        let b = mixer.attach(ChannelSource::new(1, UNIT_BIT_VOLTS)).unwrap();
        mixer.set_channel_monitored(a, true);
        mixer.set_channel_monitored(b, true);

        let mut input = MultiBuffer::new(4, 6);
        fill_channel(&mut input, 2, 0.5);
        fill_channel(&mut input, 3, 0.25);
        let mut out = StereoBuffer::new(4);
        mixer.process_cycle(&input, 6, &mut out);

        // 0.5 from channel a alone, not 0.75
        for i in 0..4 {
            assert_abs_diff_eq!(out.left()[i], 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn every_monitored_channel_carries_its_orphans() {
        let mut mixer = test_mixer(4, 100);
        let a = mixer.attach(ChannelSource::new(0, UNIT_BIT_VOLTS)).unwrap();
        let b = mixer.attach(ChannelSource::new(1, UNIT_BIT_VOLTS)).unwrap();
        mixer.set_channel_monitored(a, true);
        mixer.set_channel_monitored(b, true);

        let mut input = MultiBuffer::new(4, 6);
        fill_channel(&mut input, 2, 0.5);
        fill_channel(&mut input, 3, 0.25);
        let mut out = StereoBuffer::new(4);
        mixer.process_cycle(&input, 6, &mut out);

        // 2 orphans per channel, summed in the carry: next cycle drains 0.75
        let empty = MultiBuffer::new(4, 6);
        mixer.process_cycle(&empty, 0, &mut out);
        assert_abs_diff_eq!(out.left()[0], 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(out.left()[1], 0.75, epsilon = 1e-12);
        assert_eq!(out.left()[2], 0.0);
        assert_eq!(out.left()[3], 0.0);
    }

    #[test]
    fn drained_leftovers_come_before_fresh_input() {
        let mut mixer = test_mixer(4, 100);
        attach_monitored(&mut mixer);

        let mut input = MultiBuffer::new(4, 6);
        fill_channel(&mut input, 2, 0.5);
        let mut out = StereoBuffer::new(4);
        // 6 in, 4 out: 2 leftovers carried
        mixer.process_cycle(&input, 6, &mut out);

        fill_channel(&mut input, 2, 0.25);
        mixer.process_cycle(&input, 4, &mut out);

        // Leftovers first, then the new block
        assert_abs_diff_eq!(out.left()[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(out.left()[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(out.left()[2], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(out.left()[3], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn orphan_overrun_resets_fill_count_to_zero() {
        let mut mixer = test_mixer(4, 16);
        attach_monitored(&mut mixer);

        let mut input = MultiBuffer::new(4, 64);
        fill_channel(&mut input, 2, 0.5);
        let mut out = StereoBuffer::new(4);
        // 60 orphans against a 16-sample overflow: dropped entirely
        mixer.process_cycle(&input, 64, &mut out);

        let empty = MultiBuffer::new(4, 8);
        mixer.process_cycle(&empty, 0, &mut out);
        assert!(out.left().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn rate_change_recomputes_target_and_clears_overflow() {
        let mut mixer = test_mixer(4, 100);
        attach_monitored(&mut mixer);

        let mut input = MultiBuffer::new(4, 20);
        fill_channel(&mut input, 2, 0.5);
        let mut out = StereoBuffer::new(4);
        // Seed the overflow with 16 leftovers
        mixer.process_cycle(&input, 20, &mut out);

        // floor(44100 / 48000 * 512) + 1
        mixer.on_rate_change(44_100.0, 48_000.0, 512);
        assert_eq!(mixer.samples_expected(), 471);
        assert_eq!(mixer.core_sample_rate(), 44_100.0);

        let mut out = StereoBuffer::new(471);
        let empty = MultiBuffer::new(4, 8);
        assert_eq!(mixer.process_cycle(&empty, 0, &mut out), 471);
        assert!(out.left().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn rate_change_clamps_degenerate_rates() {
        let mut mixer = test_mixer(4, 100);
        mixer.on_rate_change(f64::NAN, -10.0, 8);
        // Both rates clamp to the floor: 1.0 / 1.0 * 8 + 1
        assert_eq!(mixer.samples_expected(), 9);
    }

    #[test]
    fn reset_connections_clears_registry_and_overflow() {
        let mut mixer = test_mixer(4, 100);
        attach_monitored(&mut mixer);

        let mut input = MultiBuffer::new(4, 8);
        fill_channel(&mut input, 2, 0.5);
        let mut out = StereoBuffer::new(4);
        mixer.process_cycle(&input, 8, &mut out);

        mixer.reset_connections();
        assert!(mixer.registry().is_empty());

        mixer.process_cycle(&input, 8, &mut out);
        assert!(out.left().iter().all(|&s| s == 0.0));

        // Slot numbering starts over after the reset
        let index = mixer.attach(ChannelSource::new(5, UNIT_BIT_VOLTS)).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn meters_track_output_peaks() {
        let mut mixer = test_mixer(8, 100);
        attach_monitored(&mut mixer);

        let mut input = MultiBuffer::new(4, 8);
        fill_channel(&mut input, 2, 0.5);
        let mut out = StereoBuffer::new(8);
        mixer.process_cycle(&input, 8, &mut out);

        let meters = mixer.meters();
        assert_abs_diff_eq!(meters.left_peak(), 0.5, epsilon = 1e-9);
        assert!(meters.left_rms() > 0.0);
        assert!(!meters.is_clipped());
    }
}
