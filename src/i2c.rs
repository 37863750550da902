/*!
  # Synchronous bit-banged I2C bus master

  This implementation consumes the following hardware resources:
  - A microsecond delay to time the half clock periods
  - Two GPIO pins for SDA and SCL lines.

  Only 7-bit addresses and a single master are supported. Clock stretching
  is not supported: SCL is always driven, never waited on.

  ## Hardware requirements

  1. Configure GPIO pins as Open-Drain outputs, with pull-ups on both lines.
  2. The delay should be reasonably accurate; the default half period of
     5 us gives a clock of roughly 100 kHz.

  ## Timing

  Data only changes while SCL is low, except for the start condition (SDA
  falls while SCL is high) and the stop condition (SDA rises while SCL is
  high). Every bit is sampled one half period after the rising SCL edge.

  ## Example

  ```ignore
    use i2c_bitbang::{Config, I2cBB, I2cBus};

    let scl = gpioa.pa1.into_open_drain_output(&mut gpioa.crl);
    let sda = gpioa.pa2.into_open_drain_output(&mut gpioa.crl);

    let mut i2c = I2cBB::with_config(scl, sda, delay, Config::default().with_frequency(50_000))?;

    // register address and payload sent without a stop in between
    i2c.write_begin(0x3c)?;
    i2c.write_block(&[0x40])?;
    i2c.write_block(&framebuffer[..128])?;
    i2c.write_end()?;

    let mut id = [0u8; 2];
    i2c.read(0x50, &mut id)?;
  ```
*/

use core::fmt;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::{Read, Write, WriteRead};
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::bus::I2cBus;
use crate::config::{AckPolicy, Config};

/// Most bytes moved by a single call.
pub const MAX_TRANSFER: usize = 255;

/// Highest 7-bit slave address.
pub const MAX_ADDRESS: u8 = 0x7f;

/// The acknowledge slot that was left high.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NoAckSource {
    /// After the control byte: nobody answers to the address.
    Address,
    /// After a data byte.
    Data,
}

/// I2C error
#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// GPIO error
    Bus(E),
    /// No ack received
    NoAck(NoAckSource),
    /// Invalid input
    InvalidData,
    /// Address does not fit in 7 bits
    AddressOutOfRange(u8),
    /// More than [`MAX_TRANSFER`] bytes
    TooLong(usize),
    /// A write transaction is still open
    Busy,
    /// No write transaction is open
    NotOpen,
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "pin error: {:?}", e),
            Error::NoAck(NoAckSource::Address) => write!(f, "address not acknowledged"),
            Error::NoAck(NoAckSource::Data) => write!(f, "data not acknowledged"),
            Error::InvalidData => write!(f, "invalid data"),
            Error::AddressOutOfRange(a) => write!(f, "address {:#04x} is not a 7-bit address", a),
            Error::TooLong(n) => write!(f, "{} bytes exceed the {} byte limit", n, MAX_TRANSFER),
            Error::Busy => write!(f, "write transaction already open"),
            Error::NotOpen => write!(f, "no write transaction open"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum State {
    Idle,
    /// The next acknowledge slot belongs to `pending`.
    Writing { pending: NoAckSource },
}

/// Bit banging I2C bus master
pub struct I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin,
    SDA: OutputPin + InputPin,
    DELAY: DelayUs<u32>,
{
    scl: SCL,
    sda: SDA,
    delay: DELAY,
    config: Config,
    state: State,
}

impl<SCL, SDA, DELAY, E> I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayUs<u32>,
{
    /// Create instance with the default [`Config`]
    pub fn new(scl: SCL, sda: SDA, delay: DELAY) -> Result<Self, Error<E>> {
        Self::with_config(scl, sda, delay, Config::default())
    }

    /// Create instance
    ///
    /// Releases SCL, then SDA, so the bus starts out idle.
    pub fn with_config(scl: SCL, sda: SDA, delay: DELAY, config: Config) -> Result<Self, Error<E>> {
        let mut bus = I2cBB {
            scl,
            sda,
            delay,
            config,
            state: State::Idle,
        };
        bus.set_scl_high()?;
        bus.set_sda_high()?;
        Ok(bus)
    }

    pub fn config(&self) -> Config {
        self.config
    }

    /// Takes effect at the next bit; change it between transactions.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// `true` between `write_begin` and `write_end`.
    pub fn is_open(&self) -> bool {
        self.state != State::Idle
    }

    /// Release the pins and the delay
    pub fn free(self) -> (SCL, SDA, DELAY) {
        (self.scl, self.sda, self.delay)
    }

    /// Address the slave for writing and stop right after its acknowledge
    /// slot. Returns whether anybody answered, regardless of the
    /// [`AckPolicy`].
    pub fn probe(&mut self, address: u8) -> Result<bool, Error<E>> {
        Self::check_address(address)?;
        self.check_idle()?;

        let ack = self.transact(|bus| {
            // ST
            bus.write_start()?;

            // SAD + W
            bus.write_byte(address << 1)?;
            let ack = bus.read_ack()?;

            // SP
            bus.write_stop()?;
            Ok(ack)
        })?;

        debug!("i2c: probe {:#04x}: {}", address, ack);
        Ok(ack)
    }

    /// Runs `f` as part of a transaction. On error the bus is closed with a
    /// stop condition and returned to idle.
    fn transact<T, F>(&mut self, f: F) -> Result<T, Error<E>>
    where
        F: FnOnce(&mut Self) -> Result<T, Error<E>>,
    {
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = State::Idle;
                // keep the first error
                if self.write_stop().is_err() {
                    warn!("i2c: stop failed, bus may be stuck");
                }
                Err(err)
            }
        }
    }

    fn check_address(address: u8) -> Result<(), Error<E>> {
        if address > MAX_ADDRESS {
            Err(Error::AddressOutOfRange(address))
        } else {
            Ok(())
        }
    }

    fn check_len(len: usize) -> Result<(), Error<E>> {
        if len > MAX_TRANSFER {
            Err(Error::TooLong(len))
        } else {
            Ok(())
        }
    }

    fn check_idle(&self) -> Result<(), Error<E>> {
        if self.state == State::Idle {
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    fn write_bytes(
        &mut self,
        mut pending: NoAckSource,
        output: &[u8],
    ) -> Result<NoAckSource, Error<E>> {
        for byte in output {
            self.check_ack(pending)?;
            self.write_byte(*byte)?;
            trace!("i2c: wrote {:#04x}", byte);
            pending = NoAckSource::Data;
        }
        Ok(pending)
    }

    fn read_from_slave(&mut self, address: u8, input: &mut [u8]) -> Result<(), Error<E>> {
        // SAD + R
        self.write_byte((address << 1) | 0x1)?;
        self.check_ack(NoAckSource::Address)?;

        for (i, slot) in input.iter_mut().enumerate() {
            if i > 0 {
                self.write_ack()?;
            }
            *slot = self.read_byte()?;
            trace!("i2c: read {:#04x}", *slot);
        }

        if self.config.nack_last_read && !input.is_empty() {
            self.write_nack()?;
        }
        Ok(())
    }

    #[inline]
    fn check_ack(&mut self, source: NoAckSource) -> Result<(), Error<E>> {
        if self.read_ack()? {
            return Ok(());
        }
        match self.config.ack_policy {
            AckPolicy::Abort => {
                warn!("i2c: no ack ({:?}), aborting", source);
                Err(Error::NoAck(source))
            }
            AckPolicy::Ignore => {
                warn!("i2c: no ack ({:?}), ignored", source);
                Ok(())
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Error<E>> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(byte & 0x80 != 0)?;
            byte <<= 1;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Error<E>> {
        let mut byte: u8 = 0;
        for _ in 0..8 {
            byte <<= 1;
            if self.read_bit()? {
                byte |= 0x01;
            }
        }
        Ok(byte)
    }

    fn write_start(&mut self) -> Result<(), Error<E>> {
        // no edges when the bus is already idle
        self.set_scl_high()?;
        self.set_sda_high()?;
        self.wait_half_period();

        self.set_sda_low()?;
        self.wait_half_period();

        self.set_scl_low()?;
        self.wait_half_period();

        Ok(())
    }

    /// Start condition following an acknowledge slot, without a stop.
    fn write_repeated_start(&mut self) -> Result<(), Error<E>> {
        self.set_scl_low()?;
        self.set_sda_high()?;
        self.wait_half_period();

        self.write_start()
    }

    fn write_stop(&mut self) -> Result<(), Error<E>> {
        self.set_scl_low()?;
        self.wait_half_period();

        self.set_sda_low()?;
        self.wait_half_period();

        self.set_scl_high()?;
        self.wait_half_period();

        self.set_sda_high()?;
        self.wait_half_period();

        Ok(())
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Error<E>> {
        self.set_scl_low()?;
        self.wait_half_period();

        if bit {
            self.set_sda_high()?;
        } else {
            self.set_sda_low()?;
        }

        self.set_scl_high()?;
        self.wait_half_period();

        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Error<E>> {
        self.set_scl_low()?;
        // only the transmitting slave may pull SDA now
        self.set_sda_high()?;
        self.wait_half_period();

        self.set_scl_high()?;
        self.wait_half_period();

        let bit = self.sda.is_high().map_err(Error::Bus)?;
        self.wait_half_period();

        Ok(bit)
    }

    /// `true` if the slave pulled SDA low.
    #[inline]
    fn read_ack(&mut self) -> Result<bool, Error<E>> {
        Ok(!self.read_bit()?)
    }

    #[inline]
    fn write_ack(&mut self) -> Result<(), Error<E>> {
        self.write_bit(false)
    }

    #[inline]
    fn write_nack(&mut self) -> Result<(), Error<E>> {
        self.write_bit(true)
    }

    #[inline]
    fn set_scl_high(&mut self) -> Result<(), Error<E>> {
        self.scl.set_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_scl_low(&mut self) -> Result<(), Error<E>> {
        self.scl.set_low().map_err(Error::Bus)
    }

    #[inline]
    fn set_sda_high(&mut self) -> Result<(), Error<E>> {
        self.sda.set_high().map_err(Error::Bus)
    }

    #[inline]
    fn set_sda_low(&mut self) -> Result<(), Error<E>> {
        self.sda.set_low().map_err(Error::Bus)
    }

    #[inline]
    fn wait_half_period(&mut self) {
        self.delay.delay_us(self.config.half_period_us.max(1));
    }
}

impl<SCL, SDA, DELAY, E> I2cBus for I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayUs<u32>,
{
    type Error = Error<E>;

    fn write_begin(&mut self, address: u8) -> Result<(), Self::Error> {
        Self::check_address(address)?;
        self.check_idle()?;

        debug!("i2c: write begin {:#04x}", address);
        self.transact(|bus| {
            // ST
            bus.write_start()?;

            // SAD + W
            bus.write_byte((address << 1) | 0x0)
        })?;

        self.state = State::Writing {
            pending: NoAckSource::Address,
        };
        Ok(())
    }

    fn write_block(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let pending = match self.state {
            State::Writing { pending } => pending,
            State::Idle => return Err(Error::NotOpen),
        };
        Self::check_len(data.len())?;

        let pending = self.transact(|bus| bus.write_bytes(pending, data))?;
        self.state = State::Writing { pending };
        Ok(())
    }

    fn write_end(&mut self) -> Result<(), Self::Error> {
        let pending = match self.state {
            State::Writing { pending } => pending,
            State::Idle => return Err(Error::NotOpen),
        };

        self.transact(|bus| {
            bus.check_ack(pending)?;

            // SP
            bus.write_stop()
        })?;

        self.state = State::Idle;
        debug!("i2c: write end");
        Ok(())
    }

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        Self::check_len(data.len())?;

        self.write_begin(address)?;
        self.write_block(data)?;
        self.write_end()
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error> {
        Self::check_address(address)?;
        Self::check_len(buffer.len())?;
        self.check_idle()?;

        if buffer.is_empty() {
            return Ok(());
        }

        debug!("i2c: read begin {:#04x}", address);
        self.transact(|bus| {
            // ST
            bus.write_start()?;

            bus.read_from_slave(address, buffer)?;

            // SP
            bus.write_stop()
        })?;

        debug!("i2c: read end");
        Ok(())
    }
}

impl<SCL, SDA, DELAY, E> Write for I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayUs<u32>,
{
    type Error = Error<E>;

    fn write(&mut self, addr: u8, output: &[u8]) -> Result<(), Self::Error> {
        I2cBus::write(self, addr, output)
    }
}

impl<SCL, SDA, DELAY, E> Read for I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayUs<u32>,
{
    type Error = Error<E>;

    fn read(&mut self, addr: u8, input: &mut [u8]) -> Result<(), Self::Error> {
        I2cBus::read(self, addr, input)
    }
}

impl<SCL, SDA, DELAY, E> WriteRead for I2cBB<SCL, SDA, DELAY>
where
    SCL: OutputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    DELAY: DelayUs<u32>,
{
    type Error = Error<E>;

    fn write_read(&mut self, addr: u8, output: &[u8], input: &mut [u8]) -> Result<(), Self::Error> {
        Self::check_address(addr)?;
        if output.is_empty() || input.is_empty() {
            return Err(Error::InvalidData);
        }
        Self::check_len(output.len())?;
        Self::check_len(input.len())?;
        self.check_idle()?;

        debug!("i2c: write-read {:#04x}", addr);
        self.transact(|bus| {
            // ST
            bus.write_start()?;

            // SAD + W
            bus.write_byte((addr << 1) | 0x0)?;
            let pending = bus.write_bytes(NoAckSource::Address, output)?;
            bus.check_ack(pending)?;

            // SR
            bus.write_repeated_start()?;

            bus.read_from_slave(addr, input)?;

            // SP
            bus.write_stop()
        })
    }
}
