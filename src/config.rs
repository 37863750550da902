//! Bus timing and protocol options.

/// Half period used by [`Config::default`], giving a 100 kHz clock.
pub const DEFAULT_HALF_PERIOD_US: u32 = 5;

/// What to do when a slave leaves the data line high in an acknowledge slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Send a stop condition and report [`Error::NoAck`](crate::i2c::Error::NoAck).
    Abort,
    /// Log it and keep clocking as if the byte had been acknowledged.
    Ignore,
}

/// Configuration of an [`I2cBB`](crate::i2c::I2cBB) bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Length of half a clock period in microseconds. 0 is treated as 1.
    pub half_period_us: u32,
    /// Reaction to a missing acknowledge.
    pub ack_policy: AckPolicy,
    /// Send a not-acknowledge after the last byte of a read.
    pub nack_last_read: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            half_period_us: DEFAULT_HALF_PERIOD_US,
            ack_policy: AckPolicy::Abort,
            nack_last_read: false,
        }
    }
}

impl Config {
    /// Set the half period from a clock frequency in Hz.
    ///
    /// The half period is rounded up, so the resulting clock is never
    /// faster than requested. Frequencies above 500 kHz are clamped to a
    /// 1 us half period.
    pub fn with_frequency(mut self, hz: u32) -> Self {
        let hz = hz.max(1);
        let mut half = 500_000 / hz;
        if 500_000 % hz != 0 {
            half += 1;
        }
        self.half_period_us = half.max(1);
        self
    }

    pub fn with_ack_policy(mut self, ack_policy: AckPolicy) -> Self {
        self.ack_policy = ack_policy;
        self
    }

    pub fn with_nack_last_read(mut self, nack_last_read: bool) -> Self {
        self.nack_last_read = nack_last_read;
        self
    }

    /// Approximate clock frequency in Hz, ignoring pin access overhead.
    pub fn frequency(&self) -> u32 {
        500_000 / self.half_period_us.max(1)
    }
}
