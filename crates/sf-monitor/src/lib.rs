//! sf-monitor: Audio monitoring pipeline for SpikeForge
//!
//! Bridges the irregular multi-channel acquisition stream onto an
//! independently clocked stereo output. The producer pushes raw blocks at
//! the acquisition rate; the sound device pulls fixed-size stereo blocks on
//! its own clock; the ping-pong overflow ring absorbs the mismatch with no
//! gaps and no unbounded latency growth. A downward expander gates the mix.
//!
//! ## Modules
//! - `config` - Construction-time parameters, validated once
//! - `registry` - Ordered input-channel descriptors, attach order = priority
//! - `overflow` - Two-slot ping-pong leftover storage
//! - `mixer` - The per-cycle drain/select/fill/carry/expand algorithm
//! - `control` - Handle/processor split with lock-free command and event rings
//! - `meters` - Atomic peak/RMS metering on the mixed output
//!
//! ## Threading
//!
//! ```text
//!   UI thread                          Audio thread
//!   ┌──────────────────┐   commands   ┌─────────────────────┐
//!   │ MonitorHandle    │─────────────▶│ MonitorProcessor    │
//!   │  set_volume()    │  (lock-free) │  .process_cycle()   │
//!   │  poll_events()   │◀─────────────│   drain → mix →     │
//!   │  meters()        │    events    │   carry → expand    │
//!   └──────────────────┘              └─────────────────────┘
//! ```

mod config;
mod control;
mod error;
mod meters;
mod mixer;
mod overflow;
mod registry;

pub use config::{
    MonitorConfig, DEFAULT_CORE_SAMPLE_RATE, DEFAULT_MAX_CHANNELS, DEFAULT_OVERFLOW_CAPACITY,
    DEFAULT_SAMPLES_EXPECTED,
};
pub use control::{
    create_monitor, MonitorCommand, MonitorEvent, MonitorHandle, MonitorProcessor,
};
pub use error::{MonitorError, MonitorResult};
pub use meters::OutputMeters;
pub use mixer::MonitorMixer;
pub use overflow::{OverflowBuffer, OverflowRing};
pub use registry::{ChannelDescriptor, ChannelRegistry, RESERVED_SLOTS};
