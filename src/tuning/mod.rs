// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Assigning frequencies to the notes that currently sound.

use crate::config::RenderConfig;
use crate::rational::Rational;

mod solution;
mod solver;
mod table;
mod temperament;

pub use self::solution::{Fundamental, Solution};
pub use self::solver::HarmonicTuner;
pub use self::table::{HarmonicRatio, HarmonicTable, TableKey};
pub use self::temperament::{
    circle_of_fifths, tempered_frequency, Temperament, TemperedTuner, JUST, PYTHAGOREAN,
};

/// The frequency a note was tuned to.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TunedNote {
    pub note: u8,
    pub frequency: f64,
    /// Exact frequency relative to the lowest note of the same tuning, if known.
    pub position: Option<Rational>,
}

/// Strategy for tuning the set of sounding notes.
///
/// Each rendering pipeline owns its tuner, so tuners only need to be movable between threads.
pub trait Tuner: Send {
    /// Tune a chord. `sustained` is the previous tuning; notes appearing in both
    /// the chord and the previous tuning have been sounding all along.
    fn tune(&mut self, notes: &[u8], sustained: &[TunedNote]) -> Vec<TunedNote>;

    /// Frequency of a note before its chord has been tuned.
    fn provisional_frequency(&self, note: u8) -> f64;
}

/// Create the tuner selected by the configuration.
pub fn tuner_for(config: &RenderConfig) -> Box<dyn Tuner> {
    match TemperedTuner::new(config.temperament, config.pitch_standard()) {
        Some(tuner) => Box::new(tuner),
        None => Box::new(HarmonicTuner::new(
            TableKey {
                steps_per_octave: config.notes_per_octave,
                max_octaves: config.max_octaves,
            },
            config.pitch_standard(),
            config.max_search_paths,
            config.cache_size,
        )),
    }
}
