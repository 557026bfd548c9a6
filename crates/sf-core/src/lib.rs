//! sf-core: Shared types for the SpikeForge monitoring crates
//!
//! Foundational sample, buffer, and channel-metadata types used across the
//! acquisition-side audio pipeline.

mod channel;
mod sample;

pub use channel::*;
pub use sample::*;
