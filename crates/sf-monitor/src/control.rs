//! Control plumbing between the UI thread and the audio thread
//!
//! The monitor is split into two parts:
//! - `MonitorHandle`: thread-safe handle for the UI thread
//! - `MonitorProcessor`: audio-thread-only owner of the mixer (not Sync)
//!
//! Parameter changes travel UI -> audio as [`MonitorCommand`]s over a
//! lock-free SPSC ring and are applied at the top of each cycle, so the
//! mixer never observes a half-applied configuration mid-phase. Applied
//! changes travel back audio -> UI as [`MonitorEvent`]s on a second ring;
//! subscribers drain them with [`MonitorHandle::poll_events`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};

use sf_core::{ChannelSource, MultiBuffer, Sample, StereoBuffer};

use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::meters::OutputMeters;
use crate::mixer::MonitorMixer;

/// Command queue capacity (UI -> audio)
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Event queue capacity (audio -> UI)
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Commands sent from the UI thread to the audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorCommand {
    /// Set the user volume level
    SetVolume(Sample),
    /// Set the expander threshold, microvolt-equivalent units
    SetNoiseGateThreshold(Sample),
    /// Toggle a channel's contribution to the mix
    SetMonitored { index: usize, monitored: bool },
}

/// Change notifications emitted after a command is applied
///
/// The observer channel that replaces any direct mixer-to-editor coupling:
/// the UI subscribes by draining [`MonitorHandle::poll_events`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorEvent {
    VolumeChanged(Sample),
    NoiseGateChanged(Sample),
    MonitorChanged { index: usize, monitored: bool },
    RateChanged { samples_expected: usize },
}

/// Shared state between handle and processor (thread-safe)
struct MonitorShared {
    /// Command producer (Mutex so clones of the handle can share it)
    command_tx: Mutex<Producer<MonitorCommand>>,
    /// Event consumer (drained by whichever UI context polls)
    event_rx: Mutex<Consumer<MonitorEvent>>,
    /// Output meters, written by the audio thread
    meters: Arc<OutputMeters>,
    /// Current per-cycle output target (for UI buffer sizing)
    samples_expected: AtomicUsize,
}

/// Thread-safe handle for the UI thread
///
/// Clonable and Sync; every method is wait-free from the audio thread's
/// point of view. A command that does not fit in the queue is dropped, the
/// UI can re-issue it.
#[derive(Clone)]
pub struct MonitorHandle {
    shared: Arc<MonitorShared>,
}

impl MonitorHandle {
    fn push_command(&self, command: MonitorCommand) {
        let _ = self.shared.command_tx.lock().push(command);
    }

    pub fn set_output_volume(&self, volume: Sample) {
        self.push_command(MonitorCommand::SetVolume(volume));
    }

    pub fn set_noise_gate_threshold(&self, threshold: Sample) {
        self.push_command(MonitorCommand::SetNoiseGateThreshold(threshold));
    }

    pub fn set_channel_monitored(&self, index: usize, monitored: bool) {
        self.push_command(MonitorCommand::SetMonitored { index, monitored });
    }

    /// Drain all pending change notifications
    pub fn poll_events(&self) -> Vec<MonitorEvent> {
        let mut rx = self.shared.event_rx.lock();
        let mut events = Vec::new();
        while let Ok(event) = rx.pop() {
            events.push(event);
        }
        events
    }

    /// Lock-free view of the output meters
    pub fn meters(&self) -> Arc<OutputMeters> {
        Arc::clone(&self.shared.meters)
    }

    /// Current per-cycle output target, as of the last rate negotiation
    pub fn samples_expected(&self) -> usize {
        self.shared.samples_expected.load(Ordering::Relaxed)
    }
}

/// Audio-thread-only owner of the mixer (not Sync)
///
/// `process_cycle` drains the command queue first, then runs the mixer, so
/// registry and parameter mutation are only ever observed at cycle
/// boundaries. Topology-time calls (`attach`, `on_rate_change`,
/// `reset_connections`) are forwarded synchronously; the host serializes
/// them against cycle execution.
pub struct MonitorProcessor {
    shared: Arc<MonitorShared>,
    command_rx: Consumer<MonitorCommand>,
    event_tx: Producer<MonitorEvent>,
    mixer: MonitorMixer,
}

impl MonitorProcessor {
    /// Run one cycle; see [`MonitorMixer::process_cycle`]
    pub fn process_cycle(
        &mut self,
        input: &MultiBuffer,
        n_samples: usize,
        out: &mut StereoBuffer,
    ) -> usize {
        self.drain_commands();
        self.mixer.process_cycle(input, n_samples, out)
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.pop() {
            let event = match command {
                MonitorCommand::SetVolume(volume) => {
                    self.mixer.set_output_volume(volume);
                    MonitorEvent::VolumeChanged(volume)
                }
                MonitorCommand::SetNoiseGateThreshold(threshold) => {
                    self.mixer.set_noise_gate_threshold(threshold);
                    MonitorEvent::NoiseGateChanged(threshold)
                }
                MonitorCommand::SetMonitored { index, monitored } => {
                    self.mixer.set_channel_monitored(index, monitored);
                    MonitorEvent::MonitorChanged { index, monitored }
                }
            };
            let _ = self.event_tx.push(event);
        }
    }

    /// Bind an upstream channel (topology-time)
    pub fn attach(&mut self, source: ChannelSource) -> MonitorResult<usize> {
        self.mixer.attach(source)
    }

    /// Renegotiate the output target (topology-time)
    pub fn on_rate_change(&mut self, core_rate: f64, device_rate: f64, device_block: usize) {
        self.mixer.on_rate_change(core_rate, device_rate, device_block);
        let samples_expected = self.mixer.samples_expected();
        self.shared
            .samples_expected
            .store(samples_expected, Ordering::Relaxed);
        let _ = self.event_tx.push(MonitorEvent::RateChanged { samples_expected });
    }

    /// Drop all channel bindings and in-flight overflow (topology-time)
    pub fn reset_connections(&mut self) {
        self.mixer.reset_connections();
    }

    pub fn mixer(&self) -> &MonitorMixer {
        &self.mixer
    }
}

/// Create a connected handle/processor pair
///
/// The handle can be cloned and shared across threads; the processor must
/// stay on the audio thread.
pub fn create_monitor(config: MonitorConfig) -> MonitorResult<(MonitorHandle, MonitorProcessor)> {
    let mixer = MonitorMixer::new(config)?;

    let (command_tx, command_rx) = RingBuffer::new(COMMAND_QUEUE_CAPACITY);
    let (event_tx, event_rx) = RingBuffer::new(EVENT_QUEUE_CAPACITY);

    let shared = Arc::new(MonitorShared {
        command_tx: Mutex::new(command_tx),
        event_rx: Mutex::new(event_rx),
        meters: mixer.meters(),
        samples_expected: AtomicUsize::new(mixer.samples_expected()),
    });

    let handle = MonitorHandle {
        shared: Arc::clone(&shared),
    };
    let processor = MonitorProcessor {
        shared,
        command_rx,
        event_tx,
        mixer,
    };

    Ok((handle, processor))
}
