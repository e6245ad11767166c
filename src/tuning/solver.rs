// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Tuning chords to harmonic ratios sharing as few fundamentals as possible.
//!
//! The notes of a chord are sorted, and for every pair of neighbouring notes
//! the harmonic table offers the ratios approximating their interval.
//! Each choice of one ratio per pair implies a set of fundamentals, notes
//! the chosen harmonics belong to. The search picks the choice whose
//! fundamentals have the smallest sum of harmonic numbers.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace, warn};

use crate::config::PitchStandard;
use crate::note::describe_chord;
use crate::rational::Rational;
use crate::util::from_steps;

use super::solution::{Fundamental, Solution};
use super::table::{HarmonicRatio, HarmonicTable, TableKey};
use super::temperament::{tempered_frequency, PYTHAGOREAN};
use super::{TunedNote, Tuner};

/// Remembers solutions of recently played chords.
struct SolutionCache {
    capacity: usize,
    entries: HashMap<Vec<u8>, Solution>,
    order: VecDeque<Vec<u8>>,
}

impl SolutionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, notes: &[u8]) -> Option<&Solution> {
        self.entries.get(notes)
    }

    fn insert(&mut self, solution: Solution) {
        if self.capacity == 0 || self.entries.contains_key(&solution.notes) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(solution.notes.clone());
        self.entries.insert(solution.notes.clone(), solution);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// One pair of neighbouring notes in the search.
struct Step {
    bottom: i32,
    candidates: Vec<HarmonicRatio>,
    /// The nearest sustained note below a sustained top note, as index into the notes,
    /// together with the ratio between the two that must be preserved.
    constraint: Option<(usize, Option<Rational>)>,
}

/// State of the depth first search over all ratio choices.
struct Search<'a> {
    table: &'a HarmonicTable,
    steps: &'a [Step],
    max_paths: usize,
    paths: usize,
    path: Vec<HarmonicRatio>,
    fundamentals: Vec<Fundamental>,
    forced_resets: usize,
    best: Option<(u32, Vec<HarmonicRatio>, Vec<Fundamental>, usize)>,
}

impl<'a> Search<'a> {
    fn fundamental(&self, bottom: i32, ratio: HarmonicRatio) -> i32 {
        bottom - self.table.harmonic_steps(ratio.bottom)
    }

    fn is_known(&self, fundamental: i32) -> bool {
        self.fundamentals.iter().any(|f| f.note == fundamental)
    }

    /// Candidates of a step, honoring the sustain constraint if possible.
    /// The flag tells whether the constraint had to be dropped.
    fn candidates(&self, depth: usize) -> (Vec<HarmonicRatio>, bool) {
        let step = &self.steps[depth];
        let (lower, required) = match step.constraint {
            Some(constraint) => constraint,
            None => return (step.candidates.clone(), false),
        };
        let needed = required.and_then(|required| {
            self.path[lower..depth]
                .iter()
                .try_fold(required, |needed, ratio| needed.checked_div(ratio.value()))
        });
        let matching: Vec<HarmonicRatio> = match needed {
            Some(needed) => step
                .candidates
                .iter()
                .copied()
                .filter(|ratio| ratio.value() == needed)
                .collect(),
            None => Vec::new(),
        };
        if matching.is_empty() {
            (step.candidates.clone(), true)
        } else {
            (matching, false)
        }
    }

    /// Returns `true` once the path limit is reached.
    fn run(&mut self, depth: usize) -> bool {
        if depth == self.steps.len() {
            self.paths += 1;
            let cost = self.fundamentals.iter().map(|f| f.weight).sum();
            if self.best.as_ref().map_or(true, |best| cost < best.0) {
                self.best = Some((
                    cost,
                    self.path.clone(),
                    self.fundamentals.clone(),
                    self.forced_resets,
                ));
            }
            return self.paths >= self.max_paths;
        }

        let bottom = self.steps[depth].bottom;
        let (candidates, forced) = self.candidates(depth);
        // ratios reusing a known fundamental tend to be cheaper, try them first
        let (reusing, introducing): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|ratio| self.is_known(self.fundamental(bottom, *ratio)));

        if forced {
            self.forced_resets += 1;
        }
        let mut done = false;
        for ratio in reusing.into_iter().chain(introducing) {
            let fundamental = self.fundamental(bottom, ratio);
            let introduced = !self.is_known(fundamental);
            if introduced {
                self.fundamentals.push(Fundamental {
                    note: fundamental,
                    weight: ratio.bottom,
                });
            }
            self.path.push(ratio);
            done = self.run(depth + 1);
            self.path.pop();
            if introduced {
                self.fundamentals.pop();
            }
            if done {
                break;
            }
        }
        if forced {
            self.forced_resets -= 1;
        }
        done
    }
}

/// Tunes chords dynamically to low harmonic ratios.
///
/// # Examples
///
/// ```
/// use entune::config::PitchStandard;
/// use entune::tuning::*;
///
/// let key = TableKey { steps_per_octave: 12, max_octaves: 4 };
/// let mut tuner = HarmonicTuner::new(key, PitchStandard::A440, 30000, 64);
///
/// let solution = tuner.solve(&[60, 64, 67], &[]);
/// assert_eq!(solution.ratios, vec![HarmonicRatio::new(5, 4), HarmonicRatio::new(6, 5)]);
///
/// let tuned = tuner.tune(&[69], &[]);
/// assert_eq!(tuned[0].frequency, 440.0);
/// ```
pub struct HarmonicTuner {
    table: HarmonicTable,
    pitch_standard: PitchStandard,
    max_paths: usize,
    cache: SolutionCache,
}

impl HarmonicTuner {
    pub fn new(
        key: TableKey,
        pitch_standard: PitchStandard,
        max_paths: usize,
        cache_size: usize,
    ) -> Self {
        Self {
            table: HarmonicTable::new(key),
            pitch_standard,
            max_paths: max_paths.max(1),
            cache: SolutionCache::new(cache_size),
        }
    }

    pub fn table(&self) -> &HarmonicTable {
        &self.table
    }

    /// Rebuild the harmonic table for other parameters.
    /// Cached solutions are dropped only if the parameters actually change.
    pub fn reconfigure(&mut self, key: TableKey) {
        if self.table.key() != key {
            debug!(
                "rebuilding harmonic table for {} steps per octave and {} octaves",
                key.steps_per_octave, key.max_octaves
            );
            self.table = HarmonicTable::new(key);
            self.cache.clear();
        }
    }

    /// Number of remembered chords.
    pub fn cached(&self) -> usize {
        self.cache.entries.len()
    }

    /// Frequency the fundamental implied by the lowest note is anchored to.
    pub fn anchor_frequency(&self, note: i32) -> f64 {
        let a4 = self.pitch_standard.frequency();
        let npo = self.table.key().steps_per_octave;
        if npo == 12 {
            tempered_frequency(&PYTHAGOREAN, note, a4)
        } else {
            a4 * from_steps(f64::from(note - 69), npo)
        }
    }

    /// Find the ratios between the given notes.
    ///
    /// `sustained` are the notes of the previous tuning that keep sounding.
    /// With two or more of them in the chord, the ratios between them are preserved
    /// whenever the harmonic table allows it.
    pub fn solve(&mut self, notes: &[u8], sustained: &[TunedNote]) -> Solution {
        let mut notes = notes.to_vec();
        notes.sort_unstable();
        notes.dedup();

        let held: Vec<&TunedNote> = notes
            .iter()
            .filter_map(|note| sustained.iter().find(|s| s.note == *note))
            .collect();
        let constrained = held.len() >= 2;

        match notes.as_slice() {
            [] => {
                return Solution {
                    notes,
                    ratios: Vec::new(),
                    fundamentals: Vec::new(),
                    forced_resets: 0,
                    exhausted: false,
                    paths: 0,
                }
            }
            [note] => return Solution::single(*note),
            _ => {}
        }
        if !constrained {
            if let Some(solution) = self.cache.get(&notes) {
                trace!("cached tuning for {}", describe_chord(&notes));
                return solution.clone();
            }
        }

        let mut steps = Vec::with_capacity(notes.len() - 1);
        for (index, pair) in notes.windows(2).enumerate() {
            let (bottom, top) = (pair[0], pair[1]);
            let candidates = match self.table.ratios(u32::from(top - bottom)) {
                Some(candidates) => candidates,
                None => {
                    warn!(
                        "no harmonic ratio for the interval {} - {}, tuning it as octave",
                        bottom, top
                    );
                    vec![HarmonicRatio::new(2, 1)]
                }
            };
            let constraint = if constrained {
                sustain_constraint(&notes, &held, index + 1)
            } else {
                None
            };
            steps.push(Step {
                bottom: i32::from(bottom),
                candidates,
                constraint,
            });
        }

        let mut search = Search {
            table: &self.table,
            steps: &steps,
            max_paths: self.max_paths,
            paths: 0,
            path: Vec::with_capacity(steps.len()),
            fundamentals: Vec::new(),
            forced_resets: 0,
            best: None,
        };
        search.run(0);
        let exhausted = search.paths >= self.max_paths;
        let paths = search.paths;
        let (ratios, fundamentals, forced_resets) = match search.best {
            Some((_, ratios, fundamentals, forced_resets)) => {
                (ratios, fundamentals, forced_resets)
            }
            // every step has at least one candidate, so at least one path completes
            None => (Vec::new(), Vec::new(), 0),
        };
        let solution = Solution {
            notes,
            ratios,
            fundamentals,
            forced_resets,
            exhausted,
            paths,
        };

        if exhausted {
            debug!(
                "tuning search for {} stopped after {} paths",
                describe_chord(&solution.notes),
                paths
            );
        }
        if !constrained {
            self.cache.insert(solution.clone());
        }
        solution
    }

    /// Turn the relative positions of a solution into frequencies.
    ///
    /// If any note of the chord was sustained, the lowest of them keeps its frequency.
    /// Otherwise the bass is pinned as harmonic of its Pythagorean tuned fundamental.
    pub fn frequencies(&self, solution: &Solution, sustained: &[TunedNote]) -> Vec<TunedNote> {
        let positions = solution.positions();
        let exact = solution.exact_positions();

        let lowest_held = solution
            .notes
            .iter()
            .enumerate()
            .find_map(|(i, note)| sustained.iter().find(|s| s.note == *note).map(|s| (i, s)));
        let bass = match lowest_held {
            Some((index, held)) => held.frequency / positions[index],
            None => {
                let harmonic = solution.ratios.first().map_or(1, |ratio| ratio.bottom);
                let bass_note = solution.notes.first().map_or(0, |note| i32::from(*note));
                let fundamental = bass_note - self.table.harmonic_steps(harmonic);
                self.anchor_frequency(fundamental) * f64::from(harmonic)
            }
        };

        solution
            .notes
            .iter()
            .zip(positions.iter().zip(exact))
            .map(|(&note, (position, exact))| TunedNote {
                note,
                frequency: bass * position,
                position: exact,
            })
            .collect()
    }
}

/// The sustain constraint of the step reaching up to `notes[top]`.
fn sustain_constraint(
    notes: &[u8],
    held: &[&TunedNote],
    top: usize,
) -> Option<(usize, Option<Rational>)> {
    let top_note = held.iter().find(|s| s.note == notes[top])?;
    let (lower, lower_note) = notes[..top]
        .iter()
        .enumerate()
        .rev()
        .find_map(|(i, note)| held.iter().find(|s| s.note == *note).map(|s| (i, *s)))?;
    let required = match (top_note.position, lower_note.position) {
        (Some(top), Some(lower)) => top.checked_div(lower),
        _ => None,
    };
    Some((lower, required))
}

impl Tuner for HarmonicTuner {
    fn tune(&mut self, notes: &[u8], sustained: &[TunedNote]) -> Vec<TunedNote> {
        let solution = self.solve(notes, sustained);
        if solution.forced_resets > 0 {
            warn!(
                "sustained notes of {} could not keep their ratios, resetting the comma {} times",
                describe_chord(&solution.notes),
                solution.forced_resets
            );
        }
        let tuned = self.frequencies(&solution, sustained);
        debug!("tuned {}: {}", describe_chord(&solution.notes), solution);
        tuned
    }

    fn provisional_frequency(&self, note: u8) -> f64 {
        self.anchor_frequency(i32::from(note))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn tuner(max_paths: usize) -> HarmonicTuner {
        HarmonicTuner::new(
            TableKey {
                steps_per_octave: 12,
                max_octaves: 4,
            },
            PitchStandard::A440,
            max_paths,
            16,
        )
    }

    fn frequency_of(tuned: &[TunedNote], note: u8) -> f64 {
        tuned.iter().find(|t| t.note == note).unwrap().frequency
    }

    #[test]
    fn test_single_note_ignores_path_limit() {
        for limit in &[0, 1, 30000] {
            let mut tuner = tuner(*limit);
            let solution = tuner.solve(&[69], &[]);
            assert!(solution.ratios.is_empty());
            let tuned = tuner.frequencies(&solution, &[]);
            assert_eq!(tuned.len(), 1);
            assert_eq!(tuned[0].frequency, 440.0);
        }
        // C4 is the Pythagorean C below A4
        let tuned = tuner(1).tune(&[60], &[]);
        assert_relative_eq!(tuned[0].frequency, 440.0 * 16.0 / 27.0, max_relative = 1e-12);
    }

    #[test]
    fn test_major_and_minor_triads() {
        let mut tuner = tuner(30000);
        let major = tuner.solve(&[67, 60, 64], &[]);
        assert_eq!(major.notes, vec![60, 64, 67]);
        assert_eq!(
            major.ratios,
            vec![HarmonicRatio::new(5, 4), HarmonicRatio::new(6, 5)]
        );
        assert_eq!(major.fundamentals, vec![Fundamental { note: 36, weight: 4 }]);
        assert_eq!(major.cost(), 4);
        assert!(!major.exhausted);

        let minor = tuner.solve(&[60, 63, 67], &[]);
        assert_eq!(
            minor.ratios,
            vec![HarmonicRatio::new(7, 6), HarmonicRatio::new(9, 7)]
        );
        assert_eq!(minor.cost(), 6);

        // the bass doubling shares the fundamental of the triad
        let spread = tuner.solve(&[48, 60, 64, 67, 72], &[]);
        assert_eq!(spread.ratios[0], HarmonicRatio::new(4, 2));
        assert_eq!(spread.cost(), 2);
    }

    #[test]
    fn test_triad_is_deterministic() {
        let run = || {
            let mut tuner = tuner(5);
            tuner.tune(&[0, 4, 7], &[])
        };
        let first = run();
        for _ in 0..3 {
            let again = run();
            let bits = |t: &Vec<TunedNote>| -> Vec<u64> {
                t.iter().map(|n| n.frequency.to_bits()).collect()
            };
            assert_eq!(bits(&first), bits(&again));
        }
    }

    #[test]
    fn test_path_limit() {
        let mut tuner = tuner(3);
        let solution = tuner.solve(&[60, 64, 67, 70], &[]);
        assert!(solution.exhausted);
        assert_eq!(solution.paths, 3);
        assert_eq!(solution.ratios.len(), 3);
    }

    #[test]
    fn test_frequencies_of_triad() {
        let mut tuner = tuner(30000);
        let tuned = tuner.tune(&[60, 64, 67], &[]);
        let c = 440.0 * 16.0 / 27.0;
        assert_relative_eq!(frequency_of(&tuned, 60), c, max_relative = 1e-12);
        assert_relative_eq!(frequency_of(&tuned, 64), c * 1.25, max_relative = 1e-12);
        assert_relative_eq!(frequency_of(&tuned, 67), c * 1.5, max_relative = 1e-12);
        assert_eq!(tuned[2].position, Some(Rational::new(3, 2)));
    }

    #[test]
    fn test_sustained_notes_keep_their_pitch() {
        let mut tuner = tuner(30000);
        let fifth = tuner.tune(&[60, 67], &[]);
        // a third is added between the sustained fifth
        let triad = tuner.tune(&[60, 64, 67], &fifth);
        assert_eq!(
            frequency_of(&triad, 60).to_bits(),
            frequency_of(&fifth, 60).to_bits()
        );
        assert_relative_eq!(
            frequency_of(&triad, 67),
            frequency_of(&fifth, 67),
            max_relative = 1e-12
        );
        let solution = tuner.solve(&[60, 64, 67], &fifth);
        assert_eq!(solution.forced_resets, 0);
    }

    #[test]
    fn test_single_sustained_note_pins_the_chord() {
        let mut tuner = tuner(30000);
        let e = TunedNote {
            note: 64,
            frequency: 330.0,
            position: Some(Rational::one()),
        };
        let triad = tuner.tune(&[60, 64, 67], &[e]);
        assert_relative_eq!(frequency_of(&triad, 64), 330.0, max_relative = 1e-12);
        assert_relative_eq!(frequency_of(&triad, 60), 264.0, max_relative = 1e-12);
    }

    #[test]
    fn test_forced_comma_reset() {
        let mut tuner = tuner(30000);
        // a Pythagorean third is not in the harmonic table
        let sustained = vec![
            TunedNote {
                note: 60,
                frequency: 256.0,
                position: Some(Rational::one()),
            },
            TunedNote {
                note: 64,
                frequency: 324.0,
                position: Some(Rational::new(81, 64)),
            },
        ];
        let solution = tuner.solve(&[60, 64, 67], &sustained);
        assert_eq!(solution.forced_resets, 1);
        assert_eq!(solution.ratios[0], HarmonicRatio::new(5, 4));
        // constrained chords are never cached
        assert_eq!(tuner.cached(), 0);
    }

    #[test]
    fn test_cache_and_reconfigure() {
        let mut tuner = tuner(30000);
        tuner.solve(&[60, 64, 67], &[]);
        tuner.solve(&[60, 64, 67], &[]);
        tuner.solve(&[62, 65, 69], &[]);
        assert_eq!(tuner.cached(), 2);

        tuner.reconfigure(TableKey {
            steps_per_octave: 12,
            max_octaves: 4,
        });
        assert_eq!(tuner.cached(), 2);
        tuner.reconfigure(TableKey {
            steps_per_octave: 12,
            max_octaves: 5,
        });
        assert_eq!(tuner.cached(), 0);
    }

    #[test]
    fn test_cache_eviction() {
        let mut cache = SolutionCache::new(2);
        for note in 60..64 {
            cache.insert(Solution::single(note));
        }
        assert_eq!(cache.entries.len(), 2);
        assert!(cache.get(&[60]).is_none());
        assert!(cache.get(&[63]).is_some());
    }
}
