// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Instrument families and the properties their tones are synthesized from.

use std::f64::consts::PI;

use crate::util::octaves_above;
use crate::wave::Side;

/// Frequency at the centre of the keyboard model.
const REFERENCE_FREQUENCY: f64 = 256.0;
/// Meters between two octaves along the keyboard.
const OCTAVE_WIDTH: f64 = 0.165;
/// Meters a fully panned channel is moved sideways.
const PAN_WIDTH: f64 = 4.0;
/// Distance of the keyboard from the listener in meters.
const LISTENER_DISTANCE: f64 = 0.2;
const EAR_SEPARATION: f64 = 0.02;
/// Meters per second.
const SOUND_SPEED: f64 = 343.174;
/// Loudest decay of any partial, in decibels per second.
const MAX_DECAY_DB: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimbreFamily {
    PluckedString,
    OrganPipe,
    Reed,
    Brass,
}

impl TimbreFamily {
    /// Family of a General MIDI program, given as the 0-based value of a program change.
    ///
    /// ```
    /// use entune::synth::timbre::TimbreFamily;
    /// assert_eq!(TimbreFamily::from_program(0), TimbreFamily::PluckedString);
    /// assert_eq!(TimbreFamily::from_program(19), TimbreFamily::OrganPipe);
    /// assert_eq!(TimbreFamily::from_program(73), TimbreFamily::OrganPipe);
    /// assert_eq!(TimbreFamily::from_program(65), TimbreFamily::Reed);
    /// assert_eq!(TimbreFamily::from_program(56), TimbreFamily::Brass);
    /// ```
    pub fn from_program(program: u8) -> Self {
        match u32::from(program) + 1 {
            1..=8 | 25..=32 => TimbreFamily::PluckedString,
            17..=24 | 74..=80 => TimbreFamily::OrganPipe,
            65..=72 => TimbreFamily::Reed,
            57..=64 => TimbreFamily::Brass,
            _ => TimbreFamily::PluckedString,
        }
    }

    pub fn properties(self) -> TimbreProperties {
        match self {
            TimbreFamily::PluckedString => TimbreProperties {
                max_harmonic: 12,
                odd_only: false,
                initial_gain: 0.1,
                inharmonicity: 0.0004,
                plucked_harmonic: Some(7.0),
                pluck_dampening: 1.0,
                decay_db: 2.0,
                harmonic_decay_db: 0.25,
                harmonic_decay_dampening: 1.0,
                chiff: 0.0,
            },
            TimbreFamily::OrganPipe => TimbreProperties {
                max_harmonic: 8,
                odd_only: false,
                initial_gain: 0.05,
                inharmonicity: 0.0,
                plucked_harmonic: None,
                pluck_dampening: 1.0,
                decay_db: 0.0,
                harmonic_decay_db: 0.0,
                harmonic_decay_dampening: 1.5,
                chiff: 0.02,
            },
            TimbreFamily::Reed => TimbreProperties {
                max_harmonic: 11,
                odd_only: true,
                initial_gain: 0.08,
                inharmonicity: 0.0,
                plucked_harmonic: None,
                pluck_dampening: 1.0,
                decay_db: 0.5,
                harmonic_decay_db: 0.05,
                harmonic_decay_dampening: 1.0,
                chiff: 0.01,
            },
            TimbreFamily::Brass => TimbreProperties {
                max_harmonic: 10,
                odd_only: false,
                initial_gain: 0.06,
                inharmonicity: 0.0,
                plucked_harmonic: Some(12.0),
                pluck_dampening: 2.0,
                decay_db: 0.5,
                harmonic_decay_db: 0.02,
                harmonic_decay_dampening: 1.0,
                chiff: 0.005,
            },
        }
    }
}

/// The values a family overrides, the synthesis itself is the same for all of them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimbreProperties {
    pub max_harmonic: u32,
    /// Only odd harmonics sound, as in a closed pipe.
    pub odd_only: bool,
    pub initial_gain: f64,
    /// Stiffness coefficient `B` stretching harmonic `h` by `sqrt(1 + B h²)`.
    pub inharmonicity: f64,
    /// Harmonic at which a string is plucked, dampening harmonics sharing a node with it.
    pub plucked_harmonic: Option<f64>,
    pub pluck_dampening: f64,
    /// Decibels per second the fundamental decays by.
    pub decay_db: f64,
    pub harmonic_decay_db: f64,
    pub harmonic_decay_dampening: f64,
    /// Amount of noise added to the fundamental while it fades.
    pub chiff: f64,
}

impl TimbreProperties {
    /// Whether a harmonic is part of the tone at all.
    pub fn has_harmonic(&self, harmonic: u32) -> bool {
        harmonic >= 1 && harmonic <= self.max_harmonic && !(self.odd_only && harmonic % 2 == 0)
    }

    /// Gain of a harmonic of a tone at the given frequency.
    pub fn harmonic_volume(&self, harmonic: u32, frequency: f64) -> f64 {
        if !self.has_harmonic(harmonic) {
            return 0.0;
        }
        let attack_dampening = 1.0 + octave_position(frequency) / 6.0;
        let h = f64::from(harmonic);
        let pluck = match self.plucked_harmonic {
            Some(plucked) => (1u32..)
                .map(f64::from)
                .take_while(|th| *th < plucked)
                .filter(|th| h % th != 0.0)
                .map(|th| ((plucked - th) / plucked).powf(self.pluck_dampening))
                .sum::<f64>(),
            None => 1.0,
        };
        self.initial_gain / h.powf(attack_dampening) * pluck
    }

    /// Decay of a harmonic in decibels per second.
    ///
    /// ```
    /// use entune::synth::timbre::TimbreFamily;
    /// let string = TimbreFamily::PluckedString.properties();
    /// assert_eq!(string.harmonic_decay(1), 2.25);
    /// assert_eq!(string.harmonic_decay(12), 30.0);
    /// ```
    pub fn harmonic_decay(&self, harmonic: u32) -> f64 {
        let h = f64::from(harmonic);
        let db = self.decay_db + self.harmonic_decay_db * h * h.powf(self.harmonic_decay_dampening);
        db.min(MAX_DECAY_DB)
    }

    /// Frequency of a harmonic, stretched by the inharmonicity.
    pub fn harmonic_frequency(&self, frequency: f64, harmonic: u32) -> f64 {
        let h = f64::from(harmonic);
        frequency * h * (1.0 + self.inharmonicity * h * h).sqrt()
    }
}

/// Octaves above the centre of the keyboard model.
pub fn octave_position(frequency: f64) -> f64 {
    octaves_above(frequency, REFERENCE_FREQUENCY)
}

/// Gain and delay with which a tone reaches one ear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub gain: f64,
    /// Seconds the sound travels to the ear.
    pub delay: f64,
}

/// Place a tone along a keyboard in front of the listener, low notes on the left.
///
/// `channel_pan` in `[-1, 1]` moves the whole keyboard sideways.
///
/// ```
/// use entune::synth::timbre::placement;
/// use entune::wave::Side;
/// let left = placement(256.0, 0.0, Side::Left);
/// let right = placement(256.0, 0.0, Side::Right);
/// assert!((left.gain - right.gain).abs() < 1e-12);
/// assert!((left.delay - right.delay).abs() < 1e-12);
///
/// let high = placement(2048.0, 0.0, Side::Right);
/// assert!(high.gain > right.gain);
/// ```
pub fn placement(frequency: f64, channel_pan: f64, side: Side) -> Placement {
    let position = octave_position(frequency);
    let x = position * OCTAVE_WIDTH + channel_pan * PAN_WIDTH;
    let ear = side.ear_offset() * EAR_SEPARATION / 2.0;
    let distance = ((x - ear).powi(2) + LISTENER_DISTANCE.powi(2)).sqrt();

    let pan = ((position / 20.0).atan() * 2.0 / PI).max(-1.0).min(1.0);
    let angle = PI * (pan / 2.0 + 0.5) / 2.0;
    let level = match side {
        Side::Left => angle.cos(),
        Side::Right => angle.sin(),
    };
    Placement {
        gain: 10f64.powf(2.0 * level.ln()),
        delay: distance / SOUND_SPEED,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pluck_dampening() {
        let string = TimbreFamily::PluckedString.properties();
        // at 256 Hz the attack dampening is exactly 1
        let fundamental = string.harmonic_volume(1, 256.0);
        assert_relative_eq!(fundamental, 0.1 * 15.0 / 7.0, max_relative = 1e-12);
        // only the pluck positions 4 and 5 leave the 6th harmonic undamped
        let sixth = string.harmonic_volume(6, 256.0);
        assert_relative_eq!(sixth, 0.1 / 6.0 * (3.0 + 2.0) / 7.0, max_relative = 1e-12);
        assert_eq!(string.harmonic_volume(13, 256.0), 0.0);
    }

    #[test]
    fn test_odd_harmonics() {
        let reed = TimbreFamily::Reed.properties();
        assert!(reed.harmonic_volume(3, 440.0) > 0.0);
        assert_eq!(reed.harmonic_volume(4, 440.0), 0.0);
        assert_eq!(reed.harmonic_frequency(440.0, 3), 1320.0);
    }

    #[test]
    fn test_inharmonic_stretch() {
        let string = TimbreFamily::PluckedString.properties();
        assert_relative_eq!(
            string.harmonic_frequency(100.0, 10),
            1000.0 * 1.04f64.sqrt(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_ears() {
        let centre = placement(256.0, 0.0, Side::Left);
        // equal power at the centre
        assert_relative_eq!(centre.gain, 10f64.powf(2.0 * 0.5f64.sqrt().ln()), max_relative = 1e-12);
        // a channel panned right reaches the right ear first
        let left = placement(256.0, 1.0, Side::Left);
        let right = placement(256.0, 1.0, Side::Right);
        assert!(right.delay < left.delay);
    }
}
