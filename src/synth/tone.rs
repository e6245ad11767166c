// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

use log::trace;

use crate::note::Velocity;
use crate::wave::Side;

use super::clip::ClipMonitor;
use super::partial::Partial;
use super::timbre::{placement, TimbreFamily, TimbreProperties};

/// How a note is played, independent of its frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voicing {
    pub timbre: TimbreFamily,
    /// Pan of the MIDI channel, in `[-1, 1]`.
    pub channel_pan: f64,
    pub velocity: Velocity,
}

/// The partials of one note as heard by one ear.
#[derive(Debug, Clone)]
pub struct Tone {
    frequency: f64,
    properties: TimbreProperties,
    /// The harmonic number of each partial.
    harmonics: Vec<u32>,
    partials: Vec<Partial>,
    monitor: ClipMonitor,
}

impl Tone {
    /// Create the partials of a tone that starts attacking at its first evaluation.
    ///
    /// Harmonics above the Nyquist frequency are left out.
    pub fn new(
        frequency: f64,
        voicing: &Voicing,
        side: Side,
        nyquist: f64,
        floor: f64,
        seed: u64,
    ) -> Self {
        let properties = voicing.timbre.properties();
        let placement = placement(frequency, voicing.channel_pan, side);
        let gain = placement.gain * voicing.velocity.as_f64();
        // the Nyquist frequency is half the sample rate
        let period = 0.5 / nyquist;

        let mut harmonics = Vec::new();
        let mut partials = Vec::new();
        for harmonic in 1..=properties.max_harmonic {
            let harmonic_frequency = properties.harmonic_frequency(frequency, harmonic);
            if harmonic_frequency > nyquist {
                break;
            }
            let volume = properties.harmonic_volume(harmonic, frequency) * gain;
            if volume == 0.0 {
                continue;
            }
            let mut partial = Partial::new(
                harmonic_frequency,
                volume,
                properties.harmonic_decay(harmonic),
                placement.delay,
                floor,
                period,
            );
            if harmonic == 1 {
                partial = partial.with_chiff(properties.chiff, seed);
            }
            harmonics.push(harmonic);
            partials.push(partial);
        }
        trace!(
            "{} tone at {:.3} Hz with {} partials",
            side,
            frequency,
            partials.len()
        );

        Self {
            frequency,
            properties,
            harmonics,
            partials,
            monitor: ClipMonitor::new(),
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    pub fn release(&mut self) {
        for partial in self.partials.iter_mut() {
            partial.lift();
        }
    }

    pub fn unrelease(&mut self) {
        for partial in self.partials.iter_mut() {
            partial.unlift();
        }
    }

    /// Move all partials to a new fundamental without interrupting them.
    pub fn retune(&mut self, frequency: f64) {
        if frequency == self.frequency {
            return;
        }
        self.frequency = frequency;
        for (partial, harmonic) in self.partials.iter_mut().zip(&self.harmonics) {
            partial.set_frequency(self.properties.harmonic_frequency(frequency, *harmonic));
        }
    }

    /// All partials are silent and none is about to attack.
    pub fn finished(&self) -> bool {
        self.partials.iter().all(Partial::finished)
    }

    /// Sum of all partials, limited to `[-1, 1]`.
    pub fn value(&mut self, second: f64, nyquist: f64) -> f64 {
        let sum = self
            .partials
            .iter_mut()
            .map(|partial| partial.value(second, nyquist))
            .sum();
        self.monitor.clip(sum)
    }

    pub fn monitor(&self) -> &ClipMonitor {
        &self.monitor
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn voicing(timbre: TimbreFamily) -> Voicing {
        Voicing {
            timbre,
            channel_pan: 0.0,
            velocity: Velocity::MAX,
        }
    }

    #[test]
    fn test_partials_stop_at_nyquist() {
        let string = voicing(TimbreFamily::PluckedString);
        let low = Tone::new(220.0, &string, Side::Left, 24000.0, 1e-9, 0);
        assert_eq!(low.partials().len(), 12);
        let high = Tone::new(4000.0, &string, Side::Left, 24000.0, 1e-9, 0);
        assert_eq!(high.partials().len(), 5);
        let reed = Tone::new(220.0, &voicing(TimbreFamily::Reed), Side::Left, 24000.0, 1e-9, 0);
        assert_eq!(reed.partials().len(), 6);
    }

    #[test]
    fn test_retune_keeps_harmonics() {
        let reed = voicing(TimbreFamily::Reed);
        let mut tone = Tone::new(220.0, &reed, Side::Right, 24000.0, 1e-9, 0);
        tone.retune(330.0);
        assert_eq!(tone.frequency(), 330.0);
        assert_relative_eq!(tone.partials()[1].frequency(), 990.0);
    }

    #[test]
    fn test_release_finishes() {
        let mut tone = Tone::new(440.0, &voicing(TimbreFamily::OrganPipe), Side::Left, 24000.0, 1e-9, 3);
        let rate = 48000.0;
        for index in 0..2000 {
            tone.value(f64::from(index) / rate, 24000.0);
        }
        assert!(!tone.finished());
        tone.release();
        for index in 2000..4000 {
            tone.value(f64::from(index) / rate, 24000.0);
        }
        assert!(tone.finished());
        assert!(!tone.monitor().has_clipped());
    }
}
