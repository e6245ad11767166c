// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Utility functions that I don't know where to put else

/// Compute a factor measured in octaves (one octave corresponds to a factor of two).
///
/// # Example
///
/// ```
/// # use entune::util::*;
///
/// assert_eq!(from_octaves(3.0), 8.0);
/// assert_eq!(from_octaves(-1.0), 0.5);
/// ```
pub fn from_octaves(octaves: f64) -> f64 {
    2.0f64.powf(octaves)
}

/// Compute a factor measured in steps of an equal division of the octave.
///
/// # Example
///
/// ```
/// # use entune::util::*;
///
/// assert_eq!(from_steps(12.0, 12), 2.0);
/// assert_eq!(from_steps(-24.0, 12), 0.25);
/// ```
pub fn from_steps(steps: f64, steps_per_octave: u32) -> f64 {
    from_octaves(steps / f64::from(steps_per_octave))
}

/// Number of octaves between a frequency and a reference frequency.
///
/// # Example
///
/// ```
/// # use entune::util::*;
///
/// assert_eq!(octaves_above(512.0, 256.0), 1.0);
/// assert_eq!(octaves_above(128.0, 256.0), -1.0);
/// ```
pub fn octaves_above(frequency: f64, reference: f64) -> f64 {
    (frequency / reference).log2()
}

/// Compute a power factor measured in decibels.
///
/// # Example
///
/// ```
/// # use entune::util::*;
///
/// assert_eq!(from_decibels(10.0), 10.0);
/// assert!((from_decibels(-20.0) - 0.01).abs() < 1e-12);
/// ```
pub fn from_decibels(db: f64) -> f64 {
    10.0f64.powf(db / 10.0)
}

/// The decibel level below which a sample of the given bit depth can no longer resolve a signal.
///
/// # Example
///
/// ```
/// # use entune::util::*;
///
/// assert!((noise_floor_db(16) + 96.33).abs() < 0.01);
/// ```
pub fn noise_floor_db(bits: u32) -> f64 {
    -10.0 * (2.0 * f64::from(bits)) * 2.0f64.log10()
}
