//! Sample types and audio buffer definitions

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Audio buffer trait for generic buffer operations
pub trait AudioBuffer {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&mut self);
}

/// Mono audio buffer
#[derive(Debug, Clone)]
pub struct MonoBuffer {
    samples: Vec<Sample>,
}

impl MonoBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            samples: vec![0.0; size],
        }
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }
}

impl AudioBuffer for MonoBuffer {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn clear(&mut self) {
        self.samples.fill(0.0);
    }
}

/// Stereo audio buffer (split channels)
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    left: Vec<Sample>,
    right: Vec<Sample>,
}

impl StereoBuffer {
    pub fn new(size: usize) -> Self {
        Self {
            left: vec![0.0; size],
            right: vec![0.0; size],
        }
    }

    #[inline]
    pub fn left(&self) -> &[Sample] {
        &self.left
    }

    #[inline]
    pub fn right(&self) -> &[Sample] {
        &self.right
    }

    #[inline]
    pub fn left_mut(&mut self) -> &mut [Sample] {
        &mut self.left
    }

    #[inline]
    pub fn right_mut(&mut self) -> &mut [Sample] {
        &mut self.right
    }

    #[inline]
    pub fn channels(&self) -> (&[Sample], &[Sample]) {
        (&self.left, &self.right)
    }

    #[inline]
    pub fn channels_mut(&mut self) -> (&mut [Sample], &mut [Sample]) {
        (&mut self.left, &mut self.right)
    }
}

impl AudioBuffer for StereoBuffer {
    fn len(&self) -> usize {
        self.left.len()
    }

    fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }
}

/// Multi-channel buffer holding one raw acquisition block, channel-major
#[derive(Debug, Clone)]
pub struct MultiBuffer {
    channels: Vec<MonoBuffer>,
}

impl MultiBuffer {
    pub fn new(num_channels: usize, size: usize) -> Self {
        Self {
            channels: vec![MonoBuffer::new(size); num_channels],
        }
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples of one channel, or `None` past the last channel
    #[inline]
    pub fn channel(&self, index: usize) -> Option<&[Sample]> {
        self.channels.get(index).map(|c| c.samples())
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [Sample]> {
        self.channels.get_mut(index).map(|c| c.samples_mut())
    }
}

impl AudioBuffer for MultiBuffer {
    fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
    }
}
