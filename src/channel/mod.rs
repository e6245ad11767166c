// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The state of the 16 MIDI channels and the voices playing on them.

use std::collections::BTreeMap;

use log::{trace, warn};

use crate::midi::Meta;
use crate::note::{Note, Velocity};
use crate::synth::{Sampler, TimbreFamily, Voicing};
use crate::tuning::TunedNote;

pub mod controls;
mod manager;
mod voice;

pub use self::controls::{Controls, Register, Toggle};
pub use self::manager::{Channels, CHANNEL_COUNT};
pub use self::voice::Voice;

/// One MIDI channel.
#[derive(Debug, Clone)]
pub struct Channel {
    index: u8,
    voices: BTreeMap<u8, Voice>,
    controls: Controls,
    program: u8,
    /// Latest channel aftertouch pressure.
    aftertouch: u8,
    /// Text and other informational meta events addressed to this channel.
    meta: Vec<Meta>,
}

impl Channel {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            voices: BTreeMap::new(),
            controls: Controls::default(),
            program: 0,
            aftertouch: 0,
            meta: Vec::new(),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.values()
    }

    pub fn voice(&self, note: u8) -> Option<&Voice> {
        self.voices.get(&note)
    }

    /// Notes that are currently held down.
    pub fn held_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.voices
            .values()
            .filter(|voice| voice.is_held())
            .map(|voice| voice.note.to_midi())
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    /// The timbre of voices pressed from now on.
    pub fn timbre(&self) -> TimbreFamily {
        TimbreFamily::from_program(self.program)
    }

    pub fn aftertouch(&self) -> u8 {
        self.aftertouch
    }

    pub fn meta(&self) -> &[Meta] {
        &self.meta
    }

    /// Press a note, creating its voice with the given frequency if it does not sound yet.
    pub fn press(&mut self, note: u8, velocity: u8, frequency: f64, sampler: &mut Sampler) {
        match self.voices.get_mut(&note) {
            Some(voice) => {
                voice.occupancy.press();
                sampler.unrelease(voice.tone);
                trace!(
                    "channel {}: {} pressed {} times",
                    self.index,
                    voice.note,
                    voice.occupancy.count()
                );
            }
            None => {
                let voicing = Voicing {
                    timbre: self.timbre(),
                    channel_pan: self.controls.value(Register::Pan),
                    velocity: Velocity::from_midi(velocity),
                };
                let tone = sampler.new_tone(frequency, &voicing);
                let voice = Voice::pressed(
                    Note::from_midi(note),
                    voicing.velocity,
                    voicing.channel_pan,
                    frequency,
                    tone,
                );
                trace!("channel {}: new voice {}", self.index, voice.note);
                self.voices.insert(note, voice);
            }
        }
    }

    /// Release a note once. Releasing a note that is not held is reported and ignored.
    pub fn release(&mut self, note: u8, sampler: &mut Sampler) -> bool {
        match self.voices.get_mut(&note) {
            Some(voice) => {
                if voice.occupancy.release() {
                    sampler.release(voice.tone);
                    true
                } else {
                    warn!(
                        "channel {}: {} released more often than pressed",
                        self.index, voice.note
                    );
                    false
                }
            }
            None => {
                warn!(
                    "channel {}: {} released without being pressed",
                    self.index,
                    Note::from_midi(note)
                );
                false
            }
        }
    }

    /// Release every held note completely, returning the notes that were held.
    pub fn release_held(&mut self, sampler: &mut Sampler) -> Vec<u8> {
        let mut released = Vec::new();
        for (note, voice) in self.voices.iter_mut() {
            let count = voice.occupancy.release_all();
            for _ in 0..count {
                sampler.release(voice.tone);
            }
            if count > 0 {
                released.push(*note);
            }
        }
        released
    }

    /// Apply a controller change, `false` if the controller is not tracked.
    pub fn control(&mut self, control: u8, value: u8) -> bool {
        self.controls.control(control, value)
    }

    pub fn bend(&mut self, value: u16) {
        self.controls.bend(value);
    }

    pub fn set_program(&mut self, program: u8) {
        self.program = program;
    }

    pub fn poly_aftertouch(&mut self, note: u8, pressure: u8) {
        if let Some(voice) = self.voices.get_mut(&note) {
            voice.aftertouch = pressure;
        }
    }

    pub fn channel_aftertouch(&mut self, pressure: u8) {
        self.aftertouch = pressure;
    }

    pub fn push_meta(&mut self, meta: Meta) {
        self.meta.push(meta);
    }

    /// Give the voices of tuned notes their new frequencies.
    pub fn retune(&mut self, tuned: &[TunedNote], sampler: &mut Sampler) {
        for tuned_note in tuned {
            if let Some(voice) = self.voices.get_mut(&tuned_note.note) {
                voice.frequency = tuned_note.frequency;
                sampler.retune(voice.tone, tuned_note.frequency);
            }
        }
    }

    /// Drop the voices that are released and whose tones have finished.
    pub fn remove_finished(&mut self, sampler: &mut Sampler) {
        let index = self.index;
        self.voices.retain(|_, voice| {
            if voice.is_held() || !sampler.finished(voice.tone) {
                return true;
            }
            sampler.remove(voice.tone);
            trace!("channel {}: removed voice {}", index, voice.note);
            false
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SampleFormat;
    use crate::wave::Side;

    fn sampler() -> Sampler {
        Sampler::new(Side::Left, 48000, SampleFormat::default())
    }

    #[test]
    fn test_overlapping_presses() {
        let mut sampler = sampler();
        let mut channel = Channel::new(0);
        channel.press(60, 100, 261.0, &mut sampler);
        channel.press(60, 80, 261.0, &mut sampler);
        assert_eq!(channel.voices().count(), 1);
        assert_eq!(channel.voice(60).unwrap().occupancy.count(), 2);

        assert!(channel.release(60, &mut sampler));
        assert_eq!(channel.held_notes().collect::<Vec<_>>(), vec![60]);
        assert!(channel.release(60, &mut sampler));
        assert!(channel.held_notes().next().is_none());
        // a third release is ignored
        assert!(!channel.release(60, &mut sampler));
        assert_eq!(channel.voice(60).unwrap().occupancy.count(), 0);
        assert!(!channel.release(61, &mut sampler));
    }

    #[test]
    fn test_voices_are_removed_once_silent() {
        let mut sampler = sampler();
        let mut channel = Channel::new(1);
        channel.press(69, 100, 440.0, &mut sampler);
        for index in 0..1000 {
            sampler.value(f64::from(index) / 48000.0);
        }
        channel.remove_finished(&mut sampler);
        assert!(channel.voice(69).is_some());

        channel.release(69, &mut sampler);
        channel.remove_finished(&mut sampler);
        // the release has not even started yet
        assert!(channel.voice(69).is_some());
        for index in 1000..3000 {
            sampler.value(f64::from(index) / 48000.0);
        }
        channel.remove_finished(&mut sampler);
        assert!(channel.voice(69).is_none());
        assert!(!sampler.sounding());
    }

    #[test]
    fn test_program_and_pan_apply_to_new_voices() {
        let mut sampler = sampler();
        let mut channel = Channel::new(2);
        channel.set_program(68);
        channel.control(0x0a, 0x7f);
        channel.press(60, 127, 261.0, &mut sampler);
        assert_eq!(channel.timbre(), TimbreFamily::Reed);
        let voice = channel.voice(60).unwrap();
        assert!(voice.pan > 0.9);
        assert_eq!(voice.velocity, Velocity::MAX);
    }

    #[test]
    fn test_release_held() {
        let mut sampler = sampler();
        let mut channel = Channel::new(3);
        channel.press(60, 100, 261.0, &mut sampler);
        channel.press(60, 100, 261.0, &mut sampler);
        channel.press(64, 100, 329.0, &mut sampler);
        assert_eq!(channel.release_held(&mut sampler), vec![60, 64]);
        assert!(channel.held_notes().next().is_none());
        for index in 0..3000 {
            sampler.value(f64::from(index) / 48000.0);
        }
        channel.remove_finished(&mut sampler);
        assert_eq!(channel.voices().count(), 0);
    }
}
