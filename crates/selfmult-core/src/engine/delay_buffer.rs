//! Per-channel circular delay buffer
//!
//! Stores the most recent input samples of every channel. A whole block is
//! written first, then the read cursor is placed `delay` samples behind the
//! position where that block started, so a zero delay reads back the block
//! that was just written.

use std::ops::Range;

use crate::types::{AudioBuffer, Sample};

/// Fixed-capacity ring buffer, one lane per channel
#[derive(Debug, Clone)]
pub struct DelayBuffer {
    /// Sample storage: `lanes[channel][position]`
    lanes: Vec<Vec<Sample>>,
    capacity: usize,
    /// Next free slot
    write_cursor: usize,
    /// Write cursor before the most recent `write`
    block_start: usize,
    read_cursor: usize,
}

impl DelayBuffer {
    /// Create a cleared buffer with `capacity` samples per channel
    pub fn new(num_channels: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "Delay buffer capacity must be non-zero");
        Self {
            lanes: vec![vec![0.0; capacity]; num_channels],
            capacity,
            write_cursor: 0,
            block_start: 0,
            read_cursor: 0,
        }
    }

    /// Samples stored per channel
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of channel lanes
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.lanes.len()
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    /// Raw contents of one lane
    pub fn lane(&self, channel: usize) -> &[Sample] {
        &self.lanes[channel]
    }

    /// Zero all lanes and rewind every cursor
    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.fill(0.0);
        }
        self.write_cursor = 0;
        self.block_start = 0;
        self.read_cursor = 0;
    }

    /// Append `range` of every channel in `input`, wrapping at the end
    ///
    /// The block must not be longer than the capacity. Channels beyond the
    /// buffer's lane count are ignored.
    pub fn write(&mut self, input: &AudioBuffer, range: Range<usize>) {
        let block_size = range.len();
        debug_assert!(block_size <= self.capacity, "block longer than delay buffer");

        // Samples that fit before the end; the remainder goes to offset 0
        let head = block_size.min(self.capacity - self.write_cursor);
        let tail = block_size - head;

        let channels = self.lanes.len().min(input.num_channels());
        for (ch, lane) in self.lanes.iter_mut().enumerate().take(channels) {
            let src = &input.channel(ch)[range.clone()];
            lane[self.write_cursor..self.write_cursor + head].copy_from_slice(&src[..head]);
            if tail > 0 {
                lane[..tail].copy_from_slice(&src[head..]);
            }
        }

        self.block_start = self.write_cursor;
        self.write_cursor = if self.write_cursor + block_size >= self.capacity {
            tail
        } else {
            self.write_cursor + block_size
        };
    }

    /// Place the read cursor `delay_samples` behind the start of the last block
    ///
    /// Delays of a full capacity or more alias modulo the capacity.
    #[inline]
    pub fn set_delay(&mut self, delay_samples: usize) {
        let delay = delay_samples % self.capacity;
        self.read_cursor = if self.block_start >= delay {
            self.block_start - delay
        } else {
            self.capacity - (delay - self.block_start)
        };
    }

    /// Read the sample `offset` positions after the read cursor
    ///
    /// `offset` is a position within the current block, so one wraparound
    /// subtraction is always enough.
    #[inline]
    pub fn read(&self, channel: usize, offset: usize) -> Sample {
        let mut index = self.read_cursor + offset;
        if index >= self.capacity {
            index -= self.capacity;
        }
        self.lanes[channel][index]
    }
}
