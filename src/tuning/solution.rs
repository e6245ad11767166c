// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

use std::fmt;

use crate::rational::Rational;

use super::table::HarmonicRatio;

/// A note whose harmonics the notes of a chord are interpreted as.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Fundamental {
    /// Note number, possibly far below the MIDI range.
    pub note: i32,
    /// Harmonic number that first required this fundamental.
    pub weight: u32,
}

/// The ratios chosen between neighbouring notes of a chord.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// Distinct notes in ascending order.
    pub notes: Vec<u8>,
    /// One ratio between each pair of neighbouring notes.
    pub ratios: Vec<HarmonicRatio>,
    pub fundamentals: Vec<Fundamental>,
    /// Number of sustain constraints that could not be satisfied on the way.
    pub forced_resets: usize,
    /// Whether the search stopped at its path limit.
    pub exhausted: bool,
    /// Number of complete paths that were considered.
    pub paths: usize,
}

impl Solution {
    /// The trivial solution of a single note.
    pub fn single(note: u8) -> Self {
        Self {
            notes: vec![note],
            ratios: Vec::new(),
            fundamentals: vec![Fundamental {
                note: i32::from(note),
                weight: 1,
            }],
            forced_resets: 0,
            exhausted: false,
            paths: 1,
        }
    }

    /// Lower is more consonant.
    pub fn cost(&self) -> u32 {
        self.fundamentals.iter().map(|f| f.weight).sum()
    }

    /// Frequency of each note relative to the lowest one.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::tuning::*;
    ///
    /// let solution = Solution {
    ///     notes: vec![60, 64, 67],
    ///     ratios: vec![HarmonicRatio::new(5, 4), HarmonicRatio::new(6, 5)],
    ///     fundamentals: vec![Fundamental { note: 36, weight: 4 }],
    ///     forced_resets: 0,
    ///     exhausted: false,
    ///     paths: 15,
    /// };
    /// assert_eq!(solution.positions(), vec![1.0, 1.25, 1.5]);
    /// assert_eq!(solution.cost(), 4);
    /// ```
    pub fn positions(&self) -> Vec<f64> {
        let mut position = 1.0;
        let mut positions = vec![position];
        for ratio in &self.ratios {
            position *= ratio.as_f64();
            positions.push(position);
        }
        positions
    }

    /// Exact relative positions, `None` from the first one that overflows.
    pub fn exact_positions(&self) -> Vec<Option<Rational>> {
        let mut position = Some(Rational::one());
        let mut positions = vec![position];
        for ratio in &self.ratios {
            position = position.and_then(|p| p.checked_mul(ratio.value()));
            positions.push(position);
        }
        positions
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ratios: Vec<String> = self.ratios.iter().map(|r| r.to_string()).collect();
        write!(f, "ratios [{}], cost {}", ratios.join(" "), self.cost())
    }
}
