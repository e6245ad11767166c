// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

use std::f64::consts::PI;

/// A phase accumulator for a sine wave whose frequency may change at any time.
///
/// The phase is never reset, so changing the frequency does not cause a discontinuity.
///
/// # Example
///
/// ```
/// use entune::synth::oscillator::Phase;
/// let mut phase = Phase::new();
/// assert_eq!(phase.advance(2.0, 0.0), 0.0);
/// assert_eq!(phase.advance(2.0, 0.125), 0.25);
/// // doubling the frequency continues from the current phase
/// assert_eq!(phase.advance(4.0, 0.25), 0.75);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Phase {
    /// Fractional part of the number of cycles completed.
    cycle: f64,
    last_second: f64,
}

impl Phase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to a point in time and return the phase in cycles, in `[0, 1)`.
    pub fn advance(&mut self, frequency: f64, second: f64) -> f64 {
        if second > self.last_second {
            self.cycle = (self.cycle + (second - self.last_second) * frequency).fract();
            self.last_second = second;
        }
        self.cycle
    }

    /// Move to a point in time and evaluate the sine wave there.
    pub fn sine(&mut self, frequency: f64, second: f64) -> f64 {
        (2.0 * PI * self.advance(frequency, second)).sin()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sine_period() {
        let rate = 48000.0;
        let mut phase = Phase::new();
        let samples: Vec<f64> = (0..480)
            .map(|i| phase.sine(440.0, f64::from(i) / rate))
            .collect();
        assert_abs_diff_eq!(samples[0], 0.0);
        // a quarter period of 440 Hz is 27.27 samples
        assert!(samples[27] > 0.99);
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        assert_eq!(crossings, 4);
    }

    #[test]
    fn test_time_never_runs_backwards() {
        let mut phase = Phase::new();
        phase.advance(10.0, 0.01);
        assert_abs_diff_eq!(phase.advance(10.0, 0.0), 0.1, epsilon = 1e-12);
    }
}
