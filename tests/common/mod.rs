//! Simulated open-drain bus with one register-file slave on it.
//!
//! The master's pins and delay share a `Wire`. Every pin change is turned
//! into line edges, which the slave decodes the way real hardware would:
//! it samples SDA on rising SCL edges, changes its own SDA output on
//! falling edges and watches for start and stop conditions.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use i2c_bitbang::{Config, I2cBB};

/// Error type of the simulated pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineFault;

/// What the slave saw on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    /// Byte clocked in from the master.
    Received(u8),
    /// Byte clocked out to the master.
    Sent(u8),
    /// Acknowledge slot answered by the slave; `true` is low (ack).
    SlaveAck(bool),
    /// Acknowledge slot answered by the master; `true` is low (ack).
    MasterAck(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Receive { byte: u8, bits: u8, control: bool },
    /// Byte complete, ack goes out on the next falling edge.
    AckPending { ack: bool, read: bool },
    AckDriven { ack: bool, read: bool },
    AckDone { ack: bool, read: bool },
    Transmit { byte: u8, bits: u8 },
    MasterAckPending,
    MasterAckSlot { sampled: Option<bool> },
}

pub struct Slave {
    pub address: u8,
    /// Acknowledge data bytes (the address is acknowledged when it matches).
    pub ack_data: bool,
    pub memory: [u8; 256],
    pointer: u8,
    pointer_set: bool,
    addressed: bool,
    sda_out: bool,
    phase: Phase,
    pub events: Vec<Event>,
}

impl Slave {
    fn new(address: u8) -> Self {
        Slave {
            address,
            ack_data: true,
            memory: [0; 256],
            pointer: 0,
            pointer_set: false,
            addressed: false,
            sda_out: true,
            phase: Phase::Idle,
            events: Vec::new(),
        }
    }

    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    fn on_start(&mut self) {
        self.events.push(Event::Start);
        self.sda_out = true;
        self.pointer_set = false;
        self.addressed = false;
        self.phase = Phase::Receive {
            byte: 0,
            bits: 0,
            control: true,
        };
    }

    fn on_stop(&mut self) {
        self.events.push(Event::Stop);
        self.sda_out = true;
        self.phase = Phase::Idle;
    }

    fn on_rise(&mut self, sda: bool) {
        let phase = self.phase;
        self.phase = match phase {
            Phase::Receive {
                byte,
                bits,
                control,
            } => {
                let byte = (byte << 1) | sda as u8;
                let bits = bits + 1;
                if bits < 8 {
                    Phase::Receive {
                        byte,
                        bits,
                        control,
                    }
                } else {
                    self.events.push(Event::Received(byte));
                    if control {
                        self.addressed = byte >> 1 == self.address;
                        Phase::AckPending {
                            ack: self.addressed,
                            read: byte & 1 == 1,
                        }
                    } else {
                        self.store(byte);
                        Phase::AckPending {
                            ack: self.ack_data,
                            read: false,
                        }
                    }
                }
            }
            Phase::AckDriven { ack, read } => {
                self.events.push(Event::SlaveAck(ack));
                Phase::AckDone { ack, read }
            }
            Phase::Transmit { byte, bits } => {
                let bits = bits + 1;
                if bits < 8 {
                    Phase::Transmit { byte, bits }
                } else {
                    self.events.push(Event::Sent(byte));
                    Phase::MasterAckPending
                }
            }
            Phase::MasterAckSlot { .. } => Phase::MasterAckSlot {
                sampled: Some(!sda),
            },
            phase => phase,
        };
    }

    fn on_fall(&mut self) {
        let phase = self.phase;
        self.phase = match phase {
            Phase::AckPending { ack, read } => {
                self.sda_out = !ack;
                Phase::AckDriven { ack, read }
            }
            Phase::AckDone { ack, read } => {
                self.sda_out = true;
                // a refused data byte does not end the transfer
                if !self.addressed {
                    Phase::Idle
                } else if read && ack {
                    self.load()
                } else {
                    Phase::Receive {
                        byte: 0,
                        bits: 0,
                        control: false,
                    }
                }
            }
            Phase::Transmit { byte, bits } => {
                self.sda_out = byte & (0x80 >> bits) != 0;
                Phase::Transmit { byte, bits }
            }
            Phase::MasterAckPending => {
                self.sda_out = true;
                Phase::MasterAckSlot { sampled: None }
            }
            // a slot only counts once the clock falls again; a stop may
            // end it first
            Phase::MasterAckSlot { sampled: Some(ack) } => {
                self.events.push(Event::MasterAck(ack));
                if ack {
                    self.load()
                } else {
                    Phase::Idle
                }
            }
            phase => phase,
        };
    }

    fn store(&mut self, byte: u8) {
        if self.pointer_set {
            self.memory[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        } else {
            self.pointer = byte;
            self.pointer_set = true;
        }
    }

    /// Put the next memory byte on the bus, MSB first.
    fn load(&mut self) -> Phase {
        let byte = self.memory[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        self.sda_out = byte & 0x80 != 0;
        Phase::Transmit { byte, bits: 0 }
    }
}

pub struct Wire {
    scl: bool,
    sda_master: bool,
    pub slave: Slave,
    /// Half periods waited, and their total length in us.
    pub waits: usize,
    pub waited_us: u64,
    waited_since_rise: bool,
    /// SDA sampled while SCL was high without a wait after the rising edge.
    pub early_samples: usize,
    /// Remaining pin writes before the pins start failing.
    pub fail_after: Option<usize>,
}

impl Wire {
    pub fn sda(&self) -> bool {
        self.sda_master && self.slave.sda_out
    }

    pub fn scl(&self) -> bool {
        self.scl
    }

    /// Both lines released by everybody.
    pub fn is_released(&self) -> bool {
        self.scl && self.sda()
    }

    pub fn events(&self) -> &[Event] {
        &self.slave.events
    }

    pub fn clear_events(&mut self) {
        self.slave.events.clear();
    }

    fn check_fault(&mut self) -> Result<(), LineFault> {
        match self.fail_after {
            Some(0) => Err(LineFault),
            Some(n) => {
                self.fail_after = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn set_scl(&mut self, level: bool) -> Result<(), LineFault> {
        self.check_fault()?;
        if level == self.scl {
            return Ok(());
        }
        self.scl = level;
        if level {
            self.waited_since_rise = false;
            let sda = self.sda();
            self.slave.on_rise(sda);
        } else {
            self.slave.on_fall();
        }
        Ok(())
    }

    fn set_sda(&mut self, level: bool) -> Result<(), LineFault> {
        self.check_fault()?;
        let before = self.sda();
        self.sda_master = level;
        let after = self.sda();
        if self.scl {
            if before && !after {
                self.slave.on_start();
            } else if !before && after {
                self.slave.on_stop();
            }
        }
        Ok(())
    }

    fn sample(&mut self) -> bool {
        if self.scl && !self.waited_since_rise {
            self.early_samples += 1;
        }
        self.sda()
    }
}

pub type SharedWire = Rc<RefCell<Wire>>;

pub struct Scl(SharedWire);

pub struct Sda(SharedWire);

pub struct Delay(SharedWire);

impl OutputPin for Scl {
    type Error = LineFault;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_scl(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_scl(true)
    }
}

impl OutputPin for Sda {
    type Error = LineFault;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_sda(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().set_sda(true)
    }
}

impl InputPin for Sda {
    type Error = LineFault;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.0.borrow_mut().sample())
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(!self.0.borrow_mut().sample())
    }
}

impl DelayUs<u32> for Delay {
    fn delay_us(&mut self, us: u32) {
        let mut wire = self.0.borrow_mut();
        wire.waits += 1;
        wire.waited_us += u64::from(us);
        wire.waited_since_rise = true;
    }
}

pub type Bus = I2cBB<Scl, Sda, Delay>;

/// A bus with a slave at `address`, both lines released.
pub fn bus(address: u8) -> (Bus, SharedWire) {
    bus_with_config(address, Config::default())
}

pub fn bus_with_config(address: u8, config: Config) -> (Bus, SharedWire) {
    let wire = wire(address, true, true);
    let i2c = I2cBB::with_config(
        Scl(wire.clone()),
        Sda(wire.clone()),
        Delay(wire.clone()),
        config,
    )
    .unwrap();
    (i2c, wire)
}

/// A wire with the master's outputs at the given levels, no bus on it yet.
pub fn wire(address: u8, scl: bool, sda: bool) -> SharedWire {
    Rc::new(RefCell::new(Wire {
        scl,
        sda_master: sda,
        slave: Slave::new(address),
        waits: 0,
        waited_us: 0,
        waited_since_rise: true,
        early_samples: 0,
        fail_after: None,
    }))
}

pub fn pins(wire: &SharedWire) -> (Scl, Sda, Delay) {
    (Scl(wire.clone()), Sda(wire.clone()), Delay(wire.clone()))
}

pub fn count(events: &[Event], wanted: Event) -> usize {
    events.iter().filter(|e| **e == wanted).count()
}

pub fn slave_acks(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::SlaveAck(_)))
        .count()
}

pub fn master_acks(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::MasterAck(_)))
        .count()
}
