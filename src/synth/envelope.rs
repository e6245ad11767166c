// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Gain curves shaping a partial over time.

use crate::util::from_decibels;

/// A linear fade between two points in time.
///
/// # Example
///
/// ```
/// use entune::synth::envelope::*;
/// let fade = Fade::new(1.0, 0.5);
/// assert_eq!(fade.fade_in(0.5), 0.0);
/// assert_eq!(fade.fade_in(1.25), 0.5);
/// assert_eq!(fade.fade_in(2.0), 1.0);
///
/// assert_eq!(fade.fade_out(1.0), 1.0);
/// assert_eq!(fade.fade_out(1.375), 0.25);
/// assert_eq!(fade.fade_out(1.5), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    start: f64,
    end: f64,
}

impl Fade {
    /// A fade starting at `start` seconds and lasting `duration` seconds.
    pub fn new(start: f64, duration: f64) -> Self {
        Self {
            start,
            end: start + duration.max(0.0),
        }
    }

    /// Rise from 0.0 to 1.0.
    pub fn fade_in(&self, second: f64) -> f64 {
        if second >= self.end {
            1.0
        } else if second <= self.start {
            0.0
        } else {
            (second - self.start) / (self.end - self.start)
        }
    }

    /// Fall from 1.0 to 0.0.
    pub fn fade_out(&self, second: f64) -> f64 {
        1.0 - self.fade_in(second)
    }
}

/// Exponential decay by a fixed number of decibels per second, starting at some point in time.
///
/// The decay is meant to be evaluated once per sample. The factor of one sample period
/// is computed up front, so consecutive evaluations only multiply the previous gain with it.
/// Evaluations that do not advance by exactly one period fall back to computing the gain directly.
///
/// # Example
///
/// ```
/// use entune::synth::envelope::*;
/// let mut decay = Decay::new(10.0, 1.0, 1.0);
/// assert_eq!(decay.gain(0.5), 1.0);
/// assert!((decay.gain(2.0) - 0.1).abs() < 1e-12);
/// assert!((decay.gain(3.0) - 0.01).abs() < 1e-12);
/// assert!((decay.gain(5.0) - 0.0001).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct Decay {
    db_per_second: f64,
    start: f64,
    /// Seconds between two consecutive samples.
    period: f64,
    /// Gain lost over one period.
    factor: f64,
    /// Time and gain of the previous evaluation.
    last: Option<(f64, f64)>,
    /// Number of gains not computed incrementally.
    direct: usize,
}

/// Relative deviation from the period still counted as a single step.
const STEP_TOLERANCE: f64 = 1e-6;

impl Decay {
    pub fn new(db_per_second: f64, start: f64, period: f64) -> Self {
        Self {
            db_per_second,
            start,
            period,
            factor: from_decibels(-db_per_second * period),
            last: None,
            direct: 0,
        }
    }

    /// The gain at a point in time, 1.0 before the decay starts.
    ///
    /// Gains that are no longer representable are reported as 0.0.
    pub fn gain(&mut self, second: f64) -> f64 {
        if second <= self.start || self.db_per_second == 0.0 {
            return 1.0;
        }
        let gain = match self.last {
            Some((last_second, last_gain))
                if ((second - last_second) - self.period).abs() <= self.period * STEP_TOLERANCE =>
            {
                last_gain * self.factor
            }
            Some((last_second, last_gain)) if second == last_second => return last_gain,
            _ => {
                self.direct += 1;
                from_decibels(-self.db_per_second * (second - self.start))
            }
        };
        let gain = if gain.is_normal() { gain } else { 0.0 };
        self.last = Some((second, gain));
        gain
    }

    /// How often the gain had to be computed from scratch.
    pub fn direct_evaluations(&self) -> usize {
        self.direct
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_incremental_decay_tracks_direct_evaluation() {
        let rate = 48000.0;
        let mut decay = Decay::new(3.0, 0.01, 1.0 / rate);
        let mut gain = 1.0;
        for index in 0..48000 {
            gain = decay.gain(f64::from(index) / rate);
        }
        let direct = from_decibels(-3.0 * (47999.0 / rate - 0.01));
        assert_relative_eq!(gain, direct, max_relative = 1e-9);
        // only the first gain after the start is computed directly
        assert_eq!(decay.direct_evaluations(), 1);
    }

    #[test]
    fn test_irregular_steps_fall_back_to_direct_evaluation() {
        let mut decay = Decay::new(6.0, 0.0, 0.25);
        assert_relative_eq!(decay.gain(0.25), from_decibels(-1.5));
        assert_relative_eq!(decay.gain(0.5), from_decibels(-3.0), max_relative = 1e-12);
        assert_eq!(decay.direct_evaluations(), 1);
        assert_relative_eq!(decay.gain(2.0), from_decibels(-12.0));
        assert_eq!(decay.direct_evaluations(), 2);
        // repeated evaluation of the same point in time
        assert_relative_eq!(decay.gain(2.0), from_decibels(-12.0));
        assert_eq!(decay.direct_evaluations(), 2);
    }

    #[test]
    fn test_decay_underflow_is_silence() {
        let mut decay = Decay::new(30.0, 0.0, 1.0 / 48000.0);
        assert_eq!(decay.gain(1e6), 0.0);
        let mut steep = Decay::new(1e300, 0.0, 1.0 / 48000.0);
        assert_eq!(steep.gain(1.0), 0.0);
    }

    #[test]
    fn test_zero_length_fade() {
        let fade = Fade::new(2.0, 0.0);
        assert_eq!(fade.fade_in(1.9), 0.0);
        assert_eq!(fade.fade_in(2.0), 1.0);
        assert_eq!(fade.fade_out(2.0), 0.0);
    }
}
