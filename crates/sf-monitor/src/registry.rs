//! Ordered registry of input channels bound to the monitor
//!
//! Descriptor order is attach order, and attach order is mixing priority:
//! the first monitored descriptor is the one the mixer actually sums into
//! the output each cycle.

use sf_core::ChannelSource;

use crate::error::{MonitorError, MonitorResult};

/// Raw-block slots reserved for the two output carriers
///
/// The acquisition block layout is owned by the host; the first two channel
/// slots carry the mixed output back out, so descriptor i reads slot i + 2.
pub const RESERVED_SLOTS: usize = 2;

/// One input channel wired into the mixer
#[derive(Debug, Clone)]
pub struct ChannelDescriptor {
    source: ChannelSource,
    monitored: bool,
    slot: usize,
}

impl ChannelDescriptor {
    /// Identity and calibration snapshot taken at attach time
    #[inline]
    pub fn source(&self) -> &ChannelSource {
        &self.source
    }

    /// Whether this channel contributes to the mix
    #[inline]
    pub fn is_monitored(&self) -> bool {
        self.monitored
    }

    /// Index of this channel in the raw acquisition block
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Ordered collection of channel descriptors, bounded at construction
#[derive(Debug)]
pub struct ChannelRegistry {
    descriptors: Vec<ChannelDescriptor>,
    max_channels: usize,
}

impl ChannelRegistry {
    pub fn new(max_channels: usize) -> Self {
        Self {
            descriptors: Vec::with_capacity(max_channels.min(64)),
            max_channels,
        }
    }

    /// Bind an upstream channel; returns the descriptor index the UI layer
    /// uses to target enable/disable
    ///
    /// The only loud failure in the pipeline: rejecting an attach beyond the
    /// configured capacity, surfaced before any cycle sees the channel.
    pub fn attach(&mut self, source: ChannelSource) -> MonitorResult<usize> {
        if self.descriptors.len() >= self.max_channels {
            return Err(MonitorError::ChannelCapacity {
                max: self.max_channels,
            });
        }
        let index = self.descriptors.len();
        log::debug!(
            "attached channel {} ({}) as monitor input {index}",
            source.id,
            source.label
        );
        self.descriptors.push(ChannelDescriptor {
            source,
            monitored: false,
            slot: RESERVED_SLOTS + index,
        });
        Ok(index)
    }

    /// Flip the monitored flag; touches nothing else. Out-of-range indices
    /// are ignored in-band, the cycle path cannot surface an error.
    pub fn set_monitored(&mut self, index: usize, monitored: bool) {
        if let Some(descriptor) = self.descriptors.get_mut(index) {
            descriptor.monitored = monitored;
        }
    }

    /// Drop all descriptors; the next attach starts over at the first
    /// post-reserved slot
    pub fn reset(&mut self) {
        self.descriptors.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&ChannelDescriptor> {
        self.descriptors.get(index)
    }

    /// All descriptors in attach order
    pub fn iter(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.descriptors.iter()
    }

    /// Monitored descriptors in attach order (mixing priority order)
    pub fn monitored(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.descriptors.iter().filter(|d| d.monitored)
    }
}
