// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Which pairs of harmonics approximate which equal tempered intervals.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::rational::Rational;

/// Two harmonics of a common fundamental, `top` sounding above `bottom`.
///
/// The pair is deliberately not normalized: `4:2` and `2:1` describe the same
/// interval, but imply different fundamentals below the bottom note.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct HarmonicRatio {
    pub top: u32,
    pub bottom: u32,
}

impl HarmonicRatio {
    pub fn new(top: u32, bottom: u32) -> Self {
        Self { top, bottom }
    }

    /// The exact frequency ratio of the interval.
    pub fn value(self) -> Rational {
        Rational::new(i64::from(self.top), i64::from(self.bottom))
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.top) / f64::from(self.bottom)
    }
}

impl fmt::Display for HarmonicRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.top, self.bottom)
    }
}

/// Parameters a harmonic table is built for.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TableKey {
    pub steps_per_octave: u32,
    pub max_octaves: u32,
}

/// Maps interval sizes, counted in steps of an equal division of the octave,
/// to all harmonic ratios rounding to that size.
#[derive(Debug, Clone)]
pub struct HarmonicTable {
    key: TableKey,
    ratios: BTreeMap<u32, Vec<HarmonicRatio>>,
    /// Distance in steps of each harmonic above its fundamental.
    harmonic_steps: HashMap<u32, i32>,
}

impl HarmonicTable {
    /// Walk up the harmonic series until every step of the octave can be expressed
    /// and at least `2^max_octaves` harmonics have been considered.
    pub fn new(key: TableKey) -> Self {
        let mut table = Self {
            key,
            ratios: BTreeMap::new(),
            harmonic_steps: HashMap::new(),
        };
        let npo = key.steps_per_octave.max(1);
        let min_harmonic = 1u32 << key.max_octaves.min(16);
        let span = npo * key.max_octaves.max(5);

        let mut top = 0;
        let mut populated = false;
        while !populated || top < min_harmonic {
            top += 1;
            let mut bottom = top;
            while bottom > 0 && !populated {
                let steps = equal_steps(npo, top, bottom);
                let entry = table.ratios.entry(steps).or_insert_with(Vec::new);
                let ratio = HarmonicRatio::new(top, bottom);
                if !entry.contains(&ratio) {
                    entry.push(ratio);
                }
                // only harmonics whose ratio to the fundamental made it into the table
                if bottom == 1 {
                    table.harmonic_steps.entry(top).or_insert(steps as i32);
                }
                bottom -= 1;
                populated = (0..npo).all(|step| table.ratios(step + span).is_some());
            }
        }
        table
    }

    pub fn key(&self) -> TableKey {
        self.key
    }

    /// All candidate ratios of an interval.
    ///
    /// Intervals beyond the table are reduced by octaves until a match is found,
    /// the top harmonic is raised by the same number of octaves.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::tuning::*;
    ///
    /// let table = HarmonicTable::new(TableKey { steps_per_octave: 12, max_octaves: 4 });
    /// assert_eq!(table.ratios(7).unwrap()[0], HarmonicRatio::new(3, 2));
    /// assert_eq!(table.ratios(4).unwrap()[0], HarmonicRatio::new(5, 4));
    /// // a major tenth is a third raised by an octave
    /// assert!(table.ratios(16).unwrap().contains(&HarmonicRatio::new(5, 2)));
    /// ```
    pub fn ratios(&self, interval: u32) -> Option<Vec<HarmonicRatio>> {
        let npo = self.key.steps_per_octave.max(1);
        let mut reduced = interval;
        let mut octaves = 0;
        loop {
            if let Some(ratios) = self.ratios.get(&reduced) {
                let factor = 1u32.checked_shl(octaves)?;
                return ratios
                    .iter()
                    .map(|r| Some(HarmonicRatio::new(r.top.checked_mul(factor)?, r.bottom)))
                    .collect();
            }
            reduced = reduced.checked_sub(npo)?;
            octaves += 1;
        }
    }

    /// Steps between a harmonic and its fundamental, 0 for harmonics outside the table.
    ///
    /// A harmonic is part of the table once its ratio to the fundamental is,
    /// harmonics only walked to reach the minimum count are not.
    ///
    /// ```
    /// use entune::tuning::*;
    ///
    /// let table = HarmonicTable::new(TableKey { steps_per_octave: 12, max_octaves: 4 });
    /// assert_eq!(table.harmonic_steps(1), 0);
    /// assert_eq!(table.harmonic_steps(4), 24);
    /// assert_eq!(table.harmonic_steps(5), 28);
    /// assert_eq!(table.harmonic_steps(1000), 0);
    /// ```
    pub fn harmonic_steps(&self, harmonic: u32) -> i32 {
        self.harmonic_steps.get(&harmonic).copied().unwrap_or(0)
    }
}

/// Size of an interval in the nearest number of equal steps.
fn equal_steps(steps_per_octave: u32, top: u32, bottom: u32) -> u32 {
    let octaves = (f64::from(top) / f64::from(bottom)).log2();
    (octaves * f64::from(steps_per_octave) + 0.5).floor() as u32
}
