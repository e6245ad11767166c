// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Additive synthesis: tones are sums of decaying harmonics.

pub mod clip;
pub mod envelope;
pub mod oscillator;
pub mod partial;
pub mod sampler;
pub mod timbre;
pub mod tone;

pub use self::sampler::{Sampler, ToneHandle};
pub use self::timbre::TimbreFamily;
pub use self::tone::{Tone, Voicing};
