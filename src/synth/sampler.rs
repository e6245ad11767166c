// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Mixing the tones of one side into integer samples.

use std::collections::BTreeMap;

use log::trace;

use crate::config::SampleFormat;
use crate::util::{from_decibels, noise_floor_db};
use crate::wave::Side;

use super::clip::ClipMonitor;
use super::tone::{Tone, Voicing};

/// Opaque handle of a tone owned by a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ToneHandle(u64);

/// Owns the tones of one side of the output.
pub struct Sampler {
    side: Side,
    sample_rate: f64,
    format: SampleFormat,
    /// Envelope level below which partials are muted.
    floor: f64,
    /// Monotonically increasing id used for identifying tones.
    next_handle: u64,
    tones: BTreeMap<ToneHandle, Tone>,
    monitor: ClipMonitor,
}

impl Sampler {
    pub fn new(side: Side, sample_rate: u32, format: SampleFormat) -> Self {
        Self {
            side,
            sample_rate: f64::from(sample_rate),
            format,
            floor: from_decibels(noise_floor_db(format.depth.bits())),
            next_handle: 0,
            tones: BTreeMap::new(),
            monitor: ClipMonitor::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Start a new tone, attacking at the next sample.
    pub fn new_tone(&mut self, frequency: f64, voicing: &Voicing) -> ToneHandle {
        let handle = ToneHandle(self.next_handle);
        self.next_handle += 1;
        let tone = Tone::new(
            frequency,
            voicing,
            self.side,
            self.nyquist(),
            self.floor,
            handle.0,
        );
        self.tones.insert(handle, tone);
        handle
    }

    pub fn tone(&self, handle: ToneHandle) -> Option<&Tone> {
        self.tones.get(&handle)
    }

    pub fn release(&mut self, handle: ToneHandle) {
        if let Some(tone) = self.tones.get_mut(&handle) {
            tone.release();
        }
    }

    pub fn unrelease(&mut self, handle: ToneHandle) {
        if let Some(tone) = self.tones.get_mut(&handle) {
            tone.unrelease();
        }
    }

    pub fn retune(&mut self, handle: ToneHandle, frequency: f64) {
        if let Some(tone) = self.tones.get_mut(&handle) {
            tone.retune(frequency);
        }
    }

    /// Removed tones count as finished.
    pub fn finished(&self, handle: ToneHandle) -> bool {
        self.tones.get(&handle).map_or(true, Tone::finished)
    }

    pub fn remove(&mut self, handle: ToneHandle) {
        if self.tones.remove(&handle).is_some() {
            trace!("removed {} tone {:?}", self.side, handle);
        }
    }

    /// Whether any tone still sounds or is about to.
    pub fn sounding(&self) -> bool {
        self.tones.values().any(|tone| !tone.finished())
    }

    /// Mix all tones at a point in time, limited to `[-1, 1]`.
    pub fn value(&mut self, second: f64) -> f64 {
        if self.tones.is_empty() {
            return 0.0;
        }
        let nyquist = self.nyquist();
        let sum = self
            .tones
            .values_mut()
            .map(|tone| tone.value(second, nyquist))
            .sum();
        self.monitor.clip(sum)
    }

    /// The packed sample at a point in time.
    pub fn sample(&mut self, second: f64) -> Vec<u8> {
        let value = self.value(second);
        let mut bytes = Vec::with_capacity(self.format.depth.bytes());
        self.format.pack(self.format.quantize(value), &mut bytes);
        bytes
    }

    pub fn monitor(&self) -> &ClipMonitor {
        &self.monitor
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::note::Velocity;
    use crate::synth::timbre::TimbreFamily;

    fn voicing() -> Voicing {
        Voicing {
            timbre: TimbreFamily::PluckedString,
            channel_pan: 0.0,
            velocity: Velocity::from_midi(100),
        }
    }

    #[test]
    fn test_floor_follows_depth() {
        let sampler = Sampler::new(Side::Left, 48000, SampleFormat::default());
        assert!((sampler.floor() - 2f64.powi(-32)).abs() < 1e-20);
    }

    #[test]
    fn test_silence_without_tones() {
        let mut sampler = Sampler::new(Side::Right, 48000, SampleFormat::default());
        assert_eq!(sampler.sample(0.0), vec![0, 0]);
        assert!(!sampler.sounding());
    }

    #[test]
    fn test_tone_lifecycle() {
        let mut sampler = Sampler::new(Side::Left, 48000, SampleFormat::default());
        let handle = sampler.new_tone(440.0, &voicing());
        assert!(sampler.sounding());
        assert!(!sampler.finished(handle));

        let mut loudest = 0.0f64;
        for index in 0..4800 {
            loudest = loudest.max(sampler.value(f64::from(index) / 48000.0).abs());
        }
        assert!(loudest > 0.01);
        assert!(loudest < 1.0);

        sampler.release(handle);
        for index in 4800..9600 {
            sampler.value(f64::from(index) / 48000.0);
        }
        assert!(sampler.finished(handle));
        assert!(!sampler.sounding());
        assert_eq!(sampler.sample(0.2), vec![0, 0]);

        sampler.remove(handle);
        assert!(sampler.tone(handle).is_none());
        assert!(sampler.finished(handle));
    }

    #[test]
    fn test_mix_is_clipped() {
        let loud = Voicing {
            timbre: TimbreFamily::OrganPipe,
            channel_pan: 0.0,
            velocity: Velocity::MAX,
        };
        let mut sampler = Sampler::new(Side::Left, 48000, SampleFormat::default());
        // many unisons add up beyond full scale
        for _ in 0..200 {
            sampler.new_tone(110.0, &loud);
        }
        let samples: Vec<Vec<u8>> = (0..4800)
            .map(|index| sampler.sample(f64::from(index) / 48000.0))
            .collect();
        assert!(sampler.monitor().has_clipped());
        assert!(samples.contains(&i16::MAX.to_le_bytes().to_vec()));
    }
}
