// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! A single harmonic with its own attack and release cycle.
//!
//! Pressing and releasing only request a change. The state machine acts on
//! the requests the next time the partial is evaluated, so several requests
//! arriving between two samples are resolved together.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::envelope::{Decay, Fade};
use super::oscillator::Phase;

/// Number of periods an attack or release fade lasts.
const FADE_PERIODS: f64 = 5.0;
/// Number of periods after the start of the attack before the decay begins.
const DECAY_DELAY_PERIODS: f64 = 1.0;
/// Frequency below which the chiff is at full strength.
const CHIFF_REFERENCE: f64 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialState {
    Lifted,
    Attacking,
    Pressed,
    Releasing,
    /// Releasing, to attack again once silent.
    Reattacking,
}

/// Breath noise added while the partial fades in or out.
#[derive(Debug, Clone)]
struct Chiff {
    amount: f64,
    rng: StdRng,
}

#[derive(Debug, Clone)]
pub struct Partial {
    frequency: f64,
    intensity: f64,
    decay_db: f64,
    /// Seconds until the sound reaches the ear.
    delay: f64,
    /// Envelope level below which the partial is muted.
    floor: f64,
    /// Seconds between two samples.
    period: f64,

    state: PartialState,
    count: i32,
    pending_attack: bool,
    pending_release: bool,

    attack: Fade,
    release: Fade,
    decay: Option<Decay>,
    phase: Phase,
    chiff: Option<Chiff>,
}

impl Partial {
    /// A partial that is pressed once, attacking at its first evaluation.
    pub fn new(
        frequency: f64,
        intensity: f64,
        decay_db: f64,
        delay: f64,
        floor: f64,
        period: f64,
    ) -> Self {
        Self {
            frequency,
            intensity,
            decay_db,
            delay,
            floor,
            period,
            state: PartialState::Lifted,
            count: 1,
            pending_attack: true,
            pending_release: false,
            attack: Fade::new(0.0, 0.0),
            release: Fade::new(0.0, 0.0),
            decay: None,
            phase: Phase::new(),
            chiff: None,
        }
    }

    /// Add deterministic noise while fading.
    pub fn with_chiff(mut self, amount: f64, seed: u64) -> Self {
        if amount > 0.0 {
            self.chiff = Some(Chiff {
                amount,
                rng: StdRng::seed_from_u64(seed),
            });
        }
        self
    }

    pub fn state(&self) -> PartialState {
        self.state
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    /// Request a release.
    pub fn lift(&mut self) {
        self.pending_release = true;
        self.count -= 1;
    }

    /// Request an attack.
    pub fn unlift(&mut self) {
        self.pending_attack = true;
        self.count += 1;
    }

    /// Silent, with no attack coming.
    pub fn finished(&self) -> bool {
        self.state == PartialState::Lifted && !self.pending_attack
    }

    /// Act on pending requests.
    pub fn actuate(&mut self, second: f64) {
        let has_attack = std::mem::replace(&mut self.pending_attack, false);
        let has_release = std::mem::replace(&mut self.pending_release, false);

        if self.count > 0 {
            match self.state {
                PartialState::Lifted => self.hammer_down(second),
                PartialState::Pressed if has_attack => {
                    self.hammer_up(second);
                    self.state = PartialState::Reattacking;
                }
                PartialState::Releasing if has_attack => self.state = PartialState::Reattacking,
                _ => {}
            }
        } else {
            match self.state {
                PartialState::Pressed => self.hammer_up(second),
                PartialState::Reattacking if has_release => self.state = PartialState::Releasing,
                _ => {}
            }
        }
    }

    fn hammer_down(&mut self, second: f64) {
        let start = second + self.delay;
        self.state = PartialState::Attacking;
        self.attack = Fade::new(start, FADE_PERIODS / self.frequency);
        self.decay = Some(Decay::new(
            self.decay_db,
            start + DECAY_DELAY_PERIODS / self.frequency,
            self.period,
        ));
    }

    fn hammer_up(&mut self, second: f64) {
        self.state = PartialState::Releasing;
        self.release = Fade::new(second + self.delay, FADE_PERIODS / self.frequency);
    }

    /// The attack or release level, advancing the state when a fade completes.
    /// Also returns the fade progress while fading.
    fn force(&mut self, second: f64) -> (f64, Option<f64>) {
        self.actuate(second);
        match self.state {
            PartialState::Lifted => (0.0, None),
            PartialState::Pressed => (1.0, None),
            PartialState::Attacking => {
                let level = self.attack.fade_in(second);
                if level >= 1.0 {
                    self.state = PartialState::Pressed;
                }
                (level, Some(level))
            }
            PartialState::Releasing | PartialState::Reattacking => {
                let level = self.release.fade_out(second);
                if level <= 0.0 {
                    if self.state == PartialState::Reattacking {
                        self.hammer_down(second);
                    } else {
                        self.state = PartialState::Lifted;
                    }
                }
                (level, Some(level))
            }
        }
    }

    /// Evaluate the partial at a point in time.
    ///
    /// Partials above the Nyquist frequency keep their state, but stay silent.
    pub fn value(&mut self, second: f64, nyquist: f64) -> f64 {
        let (force, fade) = self.force(second);
        let frequency = self.frequency;
        if frequency > nyquist {
            return 0.0;
        }
        let decay = match self.decay.as_mut() {
            Some(decay) => decay.gain(second),
            None => 1.0,
        };
        let envelope = self.intensity * force * decay;
        let wave = self.phase.sine(frequency, second);
        if envelope <= self.floor {
            return 0.0;
        }

        let noise = match (self.chiff.as_mut(), fade) {
            (Some(chiff), Some(fade)) => {
                let shape = 4.0 * fade * (1.0 - fade);
                let scale = (CHIFF_REFERENCE / frequency).min(1.0);
                chiff.amount * self.intensity * shape * scale * chiff.rng.random_range(-1.0..1.0)
            }
            _ => 0.0,
        };
        wave * envelope + noise
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const RATE: f64 = 48000.0;

    fn second(index: u32) -> f64 {
        f64::from(index) / RATE
    }

    fn run(partial: &mut Partial, from: u32, to: u32) -> Vec<f64> {
        (from..to)
            .map(|i| partial.value(second(i), RATE / 2.0))
            .collect()
    }

    fn partial() -> Partial {
        // 480 Hz fades last 500 samples
        Partial::new(480.0, 0.5, 0.0, 0.0, 1e-9, 1.0 / RATE)
    }

    #[test]
    fn test_attack_press_release() {
        let mut partial = partial();
        assert!(!partial.finished());
        run(&mut partial, 0, 1);
        assert_eq!(partial.state(), PartialState::Attacking);
        run(&mut partial, 1, 600);
        assert_eq!(partial.state(), PartialState::Pressed);

        partial.lift();
        run(&mut partial, 600, 601);
        assert_eq!(partial.state(), PartialState::Releasing);
        let tail = run(&mut partial, 601, 1200);
        assert_eq!(partial.state(), PartialState::Lifted);
        assert!(partial.finished());
        // the release fade ends 500 samples after it started
        assert!(tail[510..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_retrigger_while_sounding() {
        let mut partial = partial();
        run(&mut partial, 0, 600);
        partial.unlift();
        run(&mut partial, 600, 601);
        assert_eq!(partial.state(), PartialState::Reattacking);
        // the release completes, then the partial attacks again
        run(&mut partial, 601, 1102);
        assert_eq!(partial.state(), PartialState::Attacking);
        run(&mut partial, 1102, 1700);
        assert_eq!(partial.state(), PartialState::Pressed);
    }

    #[test]
    fn test_release_cancels_reattack() {
        let mut partial = partial();
        run(&mut partial, 0, 600);
        partial.unlift();
        run(&mut partial, 600, 601);
        partial.lift();
        partial.lift();
        run(&mut partial, 601, 602);
        assert_eq!(partial.state(), PartialState::Releasing);
        run(&mut partial, 602, 1200);
        assert!(partial.finished());
    }

    #[test]
    fn test_press_and_release_before_first_sample() {
        let mut partial = partial();
        partial.lift();
        assert_eq!(run(&mut partial, 0, 10), vec![0.0; 10]);
        assert!(partial.finished());
    }

    #[test]
    fn test_release_during_attack_waits_for_attack() {
        let mut partial = partial();
        run(&mut partial, 0, 100);
        partial.lift();
        run(&mut partial, 100, 101);
        assert_eq!(partial.state(), PartialState::Attacking);
        run(&mut partial, 101, 502);
        assert_eq!(partial.state(), PartialState::Releasing);
        run(&mut partial, 502, 1100);
        assert!(partial.finished());
    }

    #[test]
    fn test_decay_is_incremental_within_an_attack() {
        let mut partial = Partial::new(480.0, 0.5, 3.0, 0.0, 1e-9, 1.0 / RATE);
        run(&mut partial, 0, 48000);
        let decay = partial.decay.as_ref().unwrap();
        assert_eq!(decay.direct_evaluations(), 1);
    }

    #[test]
    fn test_above_nyquist_is_silent() {
        let mut partial = Partial::new(30000.0, 1.0, 0.0, 0.0, 1e-9, 1.0 / RATE);
        assert!(run(&mut partial, 0, 100).iter().all(|v| *v == 0.0));
        assert_eq!(partial.state(), PartialState::Pressed);
        partial.lift();
        run(&mut partial, 100, 200);
        assert!(partial.finished());
    }

    #[test]
    fn test_floor_mutes_without_state_change() {
        let mut partial = Partial::new(480.0, 1e-6, 0.0, 0.0, 1e-3, 1.0 / RATE);
        assert!(run(&mut partial, 0, 1000).iter().all(|v| *v == 0.0));
        assert_eq!(partial.state(), PartialState::Pressed);
    }

    #[test]
    fn test_chiff_is_deterministic() {
        let noisy = || Partial::new(480.0, 0.5, 0.0, 0.0, 1e-9, 1.0 / RATE).with_chiff(0.5, 7);
        let (mut a, mut b) = (noisy(), noisy());
        let first = run(&mut a, 0, 600);
        assert_eq!(first, run(&mut b, 0, 600));
        let clean = run(&mut partial(), 0, 600);
        assert_ne!(first, clean);
        // once pressed there is no noise
        assert_eq!(first[550..], clean[550..]);
    }
}
