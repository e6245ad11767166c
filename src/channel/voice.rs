// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

use crate::note::{Note, Occupancy, Velocity};
use crate::synth::ToneHandle;

/// A note on a channel that is held, or still sounding after being released.
#[derive(Debug, Clone)]
pub struct Voice {
    pub note: Note,
    pub occupancy: Occupancy,
    pub velocity: Velocity,
    /// Channel pan at the time the note was first pressed.
    pub pan: f64,
    pub frequency: f64,
    pub tone: ToneHandle,
    /// Latest polyphonic aftertouch pressure.
    pub aftertouch: u8,
}

impl Voice {
    /// A voice that has been pressed once.
    pub fn pressed(note: Note, velocity: Velocity, pan: f64, frequency: f64, tone: ToneHandle) -> Self {
        let mut occupancy = Occupancy::default();
        occupancy.press();
        Self {
            note,
            occupancy,
            velocity,
            pan,
            frequency,
            tone,
            aftertouch: 0,
        }
    }

    pub fn is_held(&self) -> bool {
        self.occupancy.is_held()
    }
}
