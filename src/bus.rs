//! Bus master interface.

/// Master side of an I2C bus.
///
/// Addresses are always 7-bit slave addresses; the read/write bit is added
/// by the implementation. At most 255 bytes can be moved per call.
///
/// A write transaction can be built from parts: [`write_begin`], any number
/// of [`write_block`] calls and exactly one [`write_end`]. This allows e.g.
/// a register address and its payload to come from different buffers
/// without a stop condition in between. [`write`] does all three in one go.
///
/// [`write_begin`]: I2cBus::write_begin
/// [`write_block`]: I2cBus::write_block
/// [`write_end`]: I2cBus::write_end
/// [`write`]: I2cBus::write
pub trait I2cBus {
    type Error;

    /// Start a write transaction and send the control byte for `address`.
    fn write_begin(&mut self, address: u8) -> Result<(), Self::Error>;

    /// Send `data` inside the transaction opened by `write_begin`.
    fn write_block(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Close the transaction opened by `write_begin`.
    fn write_end(&mut self) -> Result<(), Self::Error>;

    /// Write `data` to the slave at `address` in a single transaction.
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.write_begin(address)?;
        self.write_block(data)?;
        self.write_end()
    }

    /// Fill `buffer` from the slave at `address` in a single transaction.
    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), Self::Error>;
}
