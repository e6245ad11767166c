// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Definitions of what a note is.

use std::fmt;

/// Names of the pitch classes, starting at C.
pub const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A "note" is just an index on the keyboard.
/// This definition follows the MIDI standard where C4 corresponds to index 60.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Note(u8);

impl Note {
    /// The note that A4 = 440 Hz refers to.
    pub const A4: Note = Note(69);

    pub fn from_midi(midi_note: u8) -> Note {
        assert!(midi_note < 128, "MIDI only has notes 0 - 127");
        Note(midi_note)
    }

    pub fn try_from_midi(midi_note: i64) -> Option<Note> {
        if midi_note >= 0 && midi_note < 128 {
            Some(Note(midi_note as u8))
        } else {
            None
        }
    }

    pub fn to_midi(self) -> u8 {
        self.0
    }

    /// Return the note index in a signed type, convenient for further calculations.
    pub fn index(self) -> i32 {
        self.0 as i32
    }

    /// The pitch class of the note, 0 being C.
    pub fn pitch_class(self) -> usize {
        (self.0 % 12) as usize
    }

    /// The octave in scientific pitch notation, C4 being middle C.
    pub fn octave(self) -> i32 {
        self.index() / 12 - 1
    }
}

/// ```
/// use entune::note::*;
///
/// assert_eq!(Note::A4.to_string(), "A4");
/// assert_eq!(Note::from_midi(61).to_string(), "C#4");
/// assert_eq!(Note::from_midi(0).to_string(), "C-1");
/// ```
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PITCH_CLASS_NAMES[self.pitch_class()], self.octave())
    }
}

/// Format a set of MIDI note numbers for diagnostics, e.g. `[C4 E4 G4]`.
pub fn describe_chord(notes: &[u8]) -> String {
    let names: Vec<String> = notes
        .iter()
        .map(|n| Note::from_midi(n & 0x7f).to_string())
        .collect();
    format!("[{}]", names.join(" "))
}

/// The velocity of a voice indicates how hard/fast the key was pressed down.
/// A normalized float between 0.0 and 1.0 inclusive.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Velocity(f64);

impl Velocity {
    pub const MAX: Velocity = Velocity(1.0);

    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Convert a 7 bit MIDI velocity.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::note::*;
    ///
    /// assert_eq!(Velocity::from_midi(127), Velocity::MAX);
    /// assert_eq!(Velocity::from_midi(0).as_f64(), 0.0);
    /// ```
    pub fn from_midi(velocity: u8) -> Velocity {
        Velocity(f64::from(velocity.min(127)) / 127.0)
    }
}

/// How many times a key is currently held down.
///
/// MIDI streams may contain overlapping note-on/note-off pairs for the same key,
/// so a key is held as long as more presses than releases have been seen.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Occupancy(i32);

impl Occupancy {
    pub fn press(&mut self) {
        self.0 += 1;
    }

    /// Release the key once.
    ///
    /// Returns `false` and leaves the count untouched when the key was not held.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::note::*;
    ///
    /// let mut occupancy = Occupancy::default();
    /// occupancy.press();
    /// occupancy.press();
    /// assert!(occupancy.release());
    /// assert!(occupancy.is_held());
    /// assert!(occupancy.release());
    /// assert!(!occupancy.is_held());
    /// assert!(!occupancy.release());
    /// assert_eq!(occupancy.count(), 0);
    /// ```
    pub fn release(&mut self) -> bool {
        if self.0 > 0 {
            self.0 -= 1;
            true
        } else {
            false
        }
    }

    /// Drop all holds at once, returning how many there were.
    pub fn release_all(&mut self) -> i32 {
        std::mem::take(&mut self.0)
    }

    pub fn is_held(self) -> bool {
        self.0 > 0
    }

    pub fn count(self) -> i32 {
        self.0
    }
}
