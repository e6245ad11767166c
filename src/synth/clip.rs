// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

use log::{info, warn};

/// Hard-limits a signal to `[-1, 1]` and keeps track of how loud it tried to get.
///
/// A run of values each louder than any before is one excursion.
/// It is reported as a new peak once the signal stops rising.
///
/// # Example
///
/// ```
/// use entune::synth::clip::ClipMonitor;
/// let mut monitor = ClipMonitor::new();
/// assert_eq!(monitor.clip(0.5), 0.5);
/// assert!(!monitor.has_clipped());
///
/// assert_eq!(monitor.clip(1.5), 1.0);
/// assert_eq!(monitor.clip(-2.0), -1.0);
/// assert_eq!(monitor.new_peaks(), 0);
/// assert_eq!(monitor.clip(0.0), 0.0);
/// assert_eq!(monitor.new_peaks(), 1);
/// assert_eq!(monitor.peak(), 2.0);
/// ```
#[derive(Debug, Clone)]
pub struct ClipMonitor {
    peak: f64,
    rising: bool,
    has_clipped: bool,
    new_peaks: usize,
}

impl Default for ClipMonitor {
    fn default() -> Self {
        Self {
            peak: 1.0,
            rising: false,
            has_clipped: false,
            new_peaks: 0,
        }
    }
}

impl ClipMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass a value through the monitor. Values that are not finite become silence.
    pub fn clip(&mut self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let magnitude = value.abs();
        if magnitude > self.peak {
            if !self.has_clipped {
                warn!("clipped at {:.4}", value);
                self.has_clipped = true;
            }
            self.peak = magnitude;
            self.rising = true;
        } else if self.rising {
            self.rising = false;
            self.new_peaks += 1;
            info!(
                "new peak {:.4}, scale by {:.4} to avoid clipping",
                self.peak,
                1.0 / self.peak
            );
        }
        value.max(-1.0).min(1.0)
    }

    /// Largest magnitude seen so far, at least 1.0.
    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Number of completed excursions above the previous peak.
    pub fn new_peaks(&self) -> usize {
        self.new_peaks
    }

    pub fn has_clipped(&self) -> bool {
        self.has_clipped
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_one_peak_per_excursion() {
        let mut monitor = ClipMonitor::new();
        let signal = [0.9, 1.2, 1.4, 1.3, 1.1, 1.6, 0.0, 1.5, -1.5, 0.0];
        let clipped: Vec<f64> = signal.iter().map(|v| monitor.clip(*v)).collect();
        assert_eq!(
            clipped,
            vec![0.9, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, -1.0, 0.0]
        );
        // 1.2 -> 1.4 and 1.6, the later values stay below the peak
        assert_eq!(monitor.new_peaks(), 2);
        assert_eq!(monitor.peak(), 1.6);
        assert!(monitor.has_clipped());
    }

    #[test]
    fn test_non_finite_is_silence() {
        let mut monitor = ClipMonitor::new();
        assert_eq!(monitor.clip(std::f64::NAN), 0.0);
        assert_eq!(monitor.clip(std::f64::INFINITY), 0.0);
        assert!(!monitor.has_clipped());
    }
}
