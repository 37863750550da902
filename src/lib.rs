//! This is a [bit banging] I2C bus master built on the [`embedded-hal`] traits.
//!
//! [bit banging]: https://en.wikipedia.org/wiki/Bit_banging
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
//!
//! [`I2cBB`] drives SCL and SDA through two open-drain pins and times the
//! clock with a microsecond delay. It implements the [`I2cBus`] interface
//! (including the split `write_begin` / `write_block` / `write_end` write)
//! as well as the blocking I2C traits of `embedded-hal`, so existing device
//! drivers can use it directly.
//!
//! Both [`I2cBus`] and `embedded_hal::blocking::i2c` have `read` and `write`
//! methods; import only one of them in a given scope.
//!
//! ## Features
//!
//! - `log`: report transactions and bytes through the `log` facade. Without
//!   it no logging code is compiled in.

#![no_std]

mod fmt;

pub mod bus;
pub mod config;
pub mod i2c;

pub use crate::bus::I2cBus;
pub use crate::config::{AckPolicy, Config};
pub use crate::i2c::{Error, I2cBB, NoAckSource};
