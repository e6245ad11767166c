// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Fixed keyboard temperaments, and the Pythagorean anchor of the dynamic tuning.

use std::str::FromStr;

use crate::config::{ConfigError, PitchStandard, UnknownName};
use crate::util::from_octaves;

use super::{TunedNote, Tuner};

/// Index of C4 in MIDI note numbers.
const MIDDLE_C: i32 = 60;
/// Pitch class of A.
const A: usize = 9;

/// Fifths and fourths relative to C.
pub const PYTHAGOREAN: [f64; 12] = [
    1.0,
    256.0 / 243.0,
    9.0 / 8.0,
    32.0 / 27.0,
    81.0 / 64.0,
    4.0 / 3.0,
    729.0 / 512.0,
    3.0 / 2.0,
    128.0 / 81.0,
    27.0 / 16.0,
    16.0 / 9.0,
    243.0 / 128.0,
];

/// Asymmetric five limit just intonation relative to C.
pub const JUST: [f64; 12] = [
    1.0,
    16.0 / 15.0,
    9.0 / 8.0,
    6.0 / 5.0,
    5.0 / 4.0,
    4.0 / 3.0,
    45.0 / 32.0,
    3.0 / 2.0,
    8.0 / 5.0,
    5.0 / 3.0,
    9.0 / 5.0,
    15.0 / 8.0,
];

/// Share of the Pythagorean comma each fifth of the circle C, G, D, ... F is tempered by.
/// `-7` narrows a fifth by a seventh of the comma, `None` leaves it pure.
const WELL_SPREAD: [Option<i32>; 12] = [
    Some(-7),
    Some(-7),
    Some(-7),
    Some(-7),
    None,
    None,
    None,
    Some(-14),
    Some(-14),
    Some(-14),
    Some(-14),
    Some(-7),
];

/// The temperament of an 1898 Bechstein piano.
const BECHSTEIN_SPREAD: [Option<i32>; 12] = [
    Some(-4),
    Some(-4),
    Some(-4),
    Some(-4),
    None,
    None,
    None,
    Some(12),
    Some(12),
    Some(12),
    None,
    Some(-4),
];

/// How notes are mapped to frequencies.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Temperament {
    /// Chords are tuned to pure harmonic ratios while they are played.
    Dynamic,
    Equal,
    Just,
    Pythagorean,
    /// Circle of fifths tempered by sevenths and fourteenths of the comma.
    Well,
    Bechstein,
}

impl Temperament {
    pub fn default_pitch_standard(self) -> PitchStandard {
        match self {
            Temperament::Pythagorean | Temperament::Well => PitchStandard::A415,
            _ => PitchStandard::A440,
        }
    }

    /// Ratios of the twelve pitch classes relative to C, `None` for the dynamic tuning.
    pub fn ratios(self) -> Option<[f64; 12]> {
        match self {
            Temperament::Dynamic => None,
            Temperament::Equal => {
                let mut ratios = [1.0; 12];
                for (i, ratio) in ratios.iter_mut().enumerate() {
                    *ratio = from_octaves(i as f64 / 12.0);
                }
                Some(ratios)
            }
            Temperament::Just => Some(JUST),
            Temperament::Pythagorean => Some(PYTHAGOREAN),
            Temperament::Well => Some(circle_of_fifths(&WELL_SPREAD)),
            Temperament::Bechstein => Some(circle_of_fifths(&BECHSTEIN_SPREAD)),
        }
    }
}

impl FromStr for Temperament {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Temperament::Dynamic),
            "equal" | "even" => Ok(Temperament::Equal),
            "just" => Ok(Temperament::Just),
            "pythagorean" => Ok(Temperament::Pythagorean),
            "well" => Ok(Temperament::Well),
            "bechstein" => Ok(Temperament::Bechstein),
            _ => UnknownName {
                what: "temperament",
                value: s,
            }
            .fail(),
        }
    }
}

/// Stack twelve fifths, each narrowed or widened by a share of the Pythagorean comma,
/// folding them back into a single octave.
///
/// # Examples
///
/// ```
/// use entune::tuning::*;
///
/// let pure = circle_of_fifths(&[None; 12]);
/// assert_eq!(pure[7], 1.5);
/// assert_eq!(pure[2], 9.0 / 8.0);
/// ```
pub fn circle_of_fifths(spread: &[Option<i32>; 12]) -> [f64; 12] {
    let comma = 3f64.powi(12) / 2f64.powi(19);
    let mut ratios = [1.0; 12];
    let mut note = 0;
    let mut ratio = 1.0;
    for part in spread.iter() {
        note += 7;
        ratio *= 1.5 * part.map_or(1.0, |part| comma.powf(1.0 / f64::from(part)));
        if note > 12 {
            note -= 12;
            ratio /= 2.0;
        }
        if note == 12 {
            continue;
        }
        ratios[note] = ratio;
    }
    ratios
}

/// Frequency of a note in a temperament given by its pitch class ratios,
/// tuned such that A4 sounds at exactly `a4`.
///
/// Notes outside the MIDI range are allowed, fundamentals may lie far below it.
///
/// # Examples
///
/// ```
/// use entune::tuning::*;
///
/// assert_eq!(tempered_frequency(&PYTHAGOREAN, 69, 440.0), 440.0);
/// assert_eq!(tempered_frequency(&PYTHAGOREAN, 57, 440.0), 220.0);
/// assert!((tempered_frequency(&PYTHAGOREAN, 60, 440.0) - 260.7407).abs() < 1e-4);
/// ```
pub fn tempered_frequency(ratios: &[f64; 12], note: i32, a4: f64) -> f64 {
    let pitch_class = note.rem_euclid(12) as usize;
    let octave = (note - MIDDLE_C).div_euclid(12);
    a4 * (ratios[pitch_class] / ratios[A]) * from_octaves(f64::from(octave))
}

/// Assigns every note the frequency of a fixed temperament.
pub struct TemperedTuner {
    ratios: [f64; 12],
    a4: f64,
}

impl TemperedTuner {
    /// Returns `None` for the dynamic temperament, which is not fixed.
    pub fn new(temperament: Temperament, standard: PitchStandard) -> Option<Self> {
        Some(Self {
            ratios: temperament.ratios()?,
            a4: standard.frequency(),
        })
    }
}

impl Tuner for TemperedTuner {
    fn tune(&mut self, notes: &[u8], _sustained: &[TunedNote]) -> Vec<TunedNote> {
        notes
            .iter()
            .map(|&note| TunedNote {
                note,
                frequency: self.provisional_frequency(note),
                position: None,
            })
            .collect()
    }

    fn provisional_frequency(&self, note: u8) -> f64 {
        tempered_frequency(&self.ratios, i32::from(note), self.a4)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_well_tempered() {
        let well = Temperament::Well.ratios().unwrap();
        let comma = 3f64.powi(12) / 2f64.powi(19);
        // G is a fifth narrowed by a seventh of the comma
        assert_relative_eq!(well[7], 1.5 / comma.powf(1.0 / 7.0), max_relative = 1e-12);
        // the fifths B - F# - C# are pure
        assert_relative_eq!(well[6] * 2.0 / well[11], 1.5, max_relative = 1e-12);
        // all pitch classes are filled and ascending
        for pair in well.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!(well[11] < 2.0);
    }

    #[test]
    fn test_bechstein_and_equal() {
        let bechstein = Temperament::Bechstein.ratios().unwrap();
        for pair in bechstein.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        let equal = Temperament::Equal.ratios().unwrap();
        assert_relative_eq!(tempered_frequency(&equal, 81, 440.0), 880.0);
        assert_relative_eq!(tempered_frequency(&equal, 60, 440.0), 261.6255653, epsilon = 1e-6);
    }

    #[test]
    fn test_tempered_tuner() {
        let mut tuner = TemperedTuner::new(Temperament::Just, PitchStandard::A440).unwrap();
        let tuned = tuner.tune(&[57, 69], &[]);
        assert_relative_eq!(tuned[0].frequency, 220.0);
        assert_relative_eq!(tuned[1].frequency, 440.0);
        assert!(TemperedTuner::new(Temperament::Dynamic, PitchStandard::A440).is_none());
        assert_eq!("Well".parse(), Ok(Temperament::Well));
        assert!("meantone".parse::<Temperament>().is_err());
    }
}
