// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Controller state of a MIDI channel.

use std::collections::{BTreeMap, BTreeSet};

/// Controller numbers of an LSB are offset from their MSB by this amount.
const LSB_OFFSET: u8 = 0x20;
/// Controller values above this threshold switch a toggle on.
const TOGGLE_THRESHOLD: u8 = 64;

/// A continuous controller made of a most and a least significant 7 bit half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    Bank,
    Modulation,
    Breath,
    Foot,
    PortamentoTime,
    Volume,
    Balance,
    Pan,
    Expression,
    /// Set by pitch bend messages rather than a controller.
    Pitch,
}

impl Register {
    /// The register and whether the controller addresses its MSB.
    pub fn from_controller(control: u8) -> Option<(Register, bool)> {
        let (msb, is_msb) = if control >= LSB_OFFSET {
            (control - LSB_OFFSET, false)
        } else {
            (control, true)
        };
        let register = match msb {
            0x00 => Register::Bank,
            0x01 => Register::Modulation,
            0x02 => Register::Breath,
            0x04 => Register::Foot,
            0x05 => Register::PortamentoTime,
            0x07 => Register::Volume,
            0x08 => Register::Balance,
            0x0a => Register::Pan,
            0x0b => Register::Expression,
            _ => return None,
        };
        Some((register, is_msb))
    }

    /// Signed registers are centred and normalize to `[-1, 1)`.
    pub fn is_signed(self) -> bool {
        match self {
            Register::Balance | Register::Pan | Register::Pitch => true,
            _ => false,
        }
    }

    fn initial_msb(self) -> u8 {
        match self {
            Register::Volume => 0x64,
            Register::Balance | Register::Pan | Register::Pitch => 0x40,
            _ => 0,
        }
    }
}

/// A switch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Toggle {
    Damper,
    Portamento,
    Sostenuto,
    Soft,
    Legato,
    Hold,
}

impl Toggle {
    pub fn from_controller(control: u8) -> Option<Toggle> {
        match control {
            0x40 => Some(Toggle::Damper),
            0x41 => Some(Toggle::Portamento),
            0x42 => Some(Toggle::Sostenuto),
            0x43 => Some(Toggle::Soft),
            0x44 => Some(Toggle::Legato),
            0x45 => Some(Toggle::Hold),
            _ => None,
        }
    }
}

/// The two halves of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Halves {
    msb: u8,
    lsb: u8,
}

/// All registers and toggles of a channel.
///
/// # Example
///
/// ```
/// use entune::channel::controls::*;
///
/// let mut controls = Controls::default();
/// assert_eq!(controls.value(Register::Pan), 0.0);
/// assert!(controls.control(0x0a, 0x00));
/// assert_eq!(controls.value(Register::Pan), -1.0);
///
/// assert!(!controls.is_on(Toggle::Damper));
/// assert!(controls.control(0x40, 100));
/// assert!(controls.is_on(Toggle::Damper));
///
/// assert!(!controls.control(0x7b, 0));
/// ```
#[derive(Debug, Clone)]
pub struct Controls {
    registers: BTreeMap<Register, Halves>,
    toggles: BTreeSet<Toggle>,
}

impl Default for Controls {
    fn default() -> Self {
        let registers = [
            Register::Bank,
            Register::Modulation,
            Register::Breath,
            Register::Foot,
            Register::PortamentoTime,
            Register::Volume,
            Register::Balance,
            Register::Pan,
            Register::Expression,
            Register::Pitch,
        ]
        .iter()
        .map(|register| {
            let halves = Halves {
                msb: register.initial_msb(),
                lsb: 0,
            };
            (*register, halves)
        })
        .collect();
        Self {
            registers,
            toggles: BTreeSet::new(),
        }
    }
}

impl Controls {
    /// Apply a controller change. Returns `false` for controllers that are not tracked.
    pub fn control(&mut self, control: u8, value: u8) -> bool {
        let value = value & 0x7f;
        if let Some(toggle) = Toggle::from_controller(control) {
            if value > TOGGLE_THRESHOLD {
                self.toggles.insert(toggle);
            } else {
                self.toggles.remove(&toggle);
            }
            return true;
        }
        match Register::from_controller(control) {
            Some((register, is_msb)) => {
                let halves = self.registers.entry(register).or_insert(Halves {
                    msb: register.initial_msb(),
                    lsb: 0,
                });
                if is_msb {
                    halves.msb = value;
                } else {
                    halves.lsb = value;
                }
                true
            }
            None => false,
        }
    }

    /// Set the pitch register from a 14 bit pitch bend value.
    pub fn bend(&mut self, value: u16) {
        self.registers.insert(
            Register::Pitch,
            Halves {
                msb: (value >> 7) as u8 & 0x7f,
                lsb: value as u8 & 0x7f,
            },
        );
    }

    /// The combined 14 bit value of a register.
    pub fn raw(&self, register: Register) -> u16 {
        let halves = self.registers.get(&register).copied().unwrap_or(Halves {
            msb: register.initial_msb(),
            lsb: 0,
        });
        u16::from(halves.lsb) | u16::from(halves.msb) << 7
    }

    /// The normalized value of a register.
    ///
    /// ```
    /// use entune::channel::controls::*;
    ///
    /// let mut controls = Controls::default();
    /// assert_eq!(controls.value(Register::Volume), f64::from(0x64 << 7) / 16383.0);
    /// controls.bend(0x3fff);
    /// assert_eq!(controls.value(Register::Pitch), 16383.0 / 8192.0 - 1.0);
    /// ```
    pub fn value(&self, register: Register) -> f64 {
        let raw = f64::from(self.raw(register));
        if register.is_signed() {
            raw / 8192.0 - 1.0
        } else {
            raw / 16383.0
        }
    }

    pub fn is_on(&self, toggle: Toggle) -> bool {
        self.toggles.contains(&toggle)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_msb_and_lsb_combine() {
        let mut controls = Controls::default();
        controls.control(0x07, 0x7f);
        controls.control(0x27, 0x7f);
        assert_eq!(controls.raw(Register::Volume), 0x3fff);
        assert_eq!(controls.value(Register::Volume), 1.0);
        // pan LSB alone keeps the centred MSB
        controls.control(0x2a, 0x01);
        assert_eq!(controls.raw(Register::Pan), 0x2001);
    }

    #[test]
    fn test_toggle_threshold() {
        let mut controls = Controls::default();
        controls.control(0x42, 65);
        assert!(controls.is_on(Toggle::Sostenuto));
        controls.control(0x42, 64);
        assert!(!controls.is_on(Toggle::Sostenuto));
    }

    #[test]
    fn test_unknown_controllers() {
        assert_eq!(Register::from_controller(0x03), None);
        assert_eq!(Register::from_controller(0x46), None);
        assert_eq!(Register::from_controller(0x2a), Some((Register::Pan, false)));
        assert_eq!(Toggle::from_controller(0x07), None);
    }
}
