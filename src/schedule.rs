// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Delivering events in time order while playback time advances.

use std::collections::BinaryHeap;

use log::debug;

use crate::midi::Timing;

/// Tempo assumed until the first tempo event, 120 beats per minute.
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

struct Scheduled<T> {
    time: u64,
    sequence: u64,
    item: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.sequence == other.sequence
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // the earliest item is the largest one for the max heap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A priority queue delivering items in time order.
/// Items scheduled for the same time are delivered in the order they were scheduled.
pub struct ScheduledQueue<T> {
    heap: BinaryHeap<Scheduled<T>>,
    next_sequence: u64,
}

impl<T> Default for ScheduledQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }
}

impl<T> ScheduledQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, time: u64, item: T) {
        self.heap.push(Scheduled {
            time,
            sequence: self.next_sequence,
            item,
        });
        self.next_sequence += 1;
    }

    /// Remove and return all items due at or before `time`.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::schedule::*;
    ///
    /// let mut queue = ScheduledQueue::new();
    /// queue.schedule(10, "late");
    /// queue.schedule(0, "first");
    /// queue.schedule(0, "second");
    ///
    /// assert_eq!(queue.advance_to(5), vec!["first", "second"]);
    /// assert!(queue.advance_to(9).is_empty());
    /// assert_eq!(queue.advance_to(10), vec!["late"]);
    /// assert!(queue.is_empty());
    /// ```
    pub fn advance_to(&mut self, time: u64) -> Vec<T> {
        let mut due = Vec::new();
        while self.next_time().map_or(false, |next| next <= time) {
            if let Some(scheduled) = self.heap.pop() {
                due.push(scheduled.item);
            }
        }
        due
    }

    /// Time of the earliest pending item.
    pub fn next_time(&self) -> Option<u64> {
        self.heap.peek().map(|scheduled| scheduled.time)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Converts elapsed seconds into elapsed ticks.
///
/// The tempo may change at any time, so ticks are accumulated
/// piecewise using the tempo in effect at each update.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    timing: Timing,
    micros_per_beat: u32,
    ticks_per_second: f64,
    seconds: f64,
    ticks: f64,
}

impl PlaybackClock {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            micros_per_beat: DEFAULT_MICROS_PER_BEAT,
            ticks_per_second: timing.ticks_per_second(DEFAULT_MICROS_PER_BEAT),
            seconds: 0.0,
            ticks: 0.0,
        }
    }

    /// Move the clock to an absolute number of seconds since the start.
    /// Going backwards is ignored.
    pub fn update(&mut self, seconds: f64) {
        if seconds > self.seconds {
            self.ticks += (seconds - self.seconds) * self.ticks_per_second;
            self.seconds = seconds;
        }
    }

    /// Change the tempo from now on. Timecode based timing ignores the tempo.
    pub fn set_tempo(&mut self, micros_per_beat: u32) {
        self.micros_per_beat = micros_per_beat;
        self.ticks_per_second = self.timing.ticks_per_second(micros_per_beat);
        debug!(
            "tempo {:.2} bpm, {:.1} ticks per second at {:.3}s",
            self.bpm(),
            self.ticks_per_second,
            self.seconds
        );
    }

    pub fn bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.micros_per_beat.max(1))
    }

    /// Number of whole ticks elapsed.
    pub fn ticks(&self) -> u64 {
        self.ticks as u64
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equal_times_are_fifo() {
        let mut queue = ScheduledQueue::new();
        for (i, time) in [5u64, 3, 5, 1, 3, 5, 0].iter().enumerate() {
            queue.schedule(*time, (*time, i));
        }
        let mut delivered = Vec::new();
        for target in &[0u64, 2, 3, 4, 10] {
            for (time, i) in queue.advance_to(*target) {
                assert!(time <= *target);
                delivered.push((time, i));
            }
        }
        assert_eq!(
            delivered,
            vec![(0, 6), (1, 3), (3, 1), (3, 4), (5, 0), (5, 2), (5, 5)]
        );
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_clock_tempo_change() {
        let mut clock = PlaybackClock::new(Timing::Metrical {
            ticks_per_beat: 480,
        });
        assert_relative_eq!(clock.bpm(), 120.0);
        clock.update(1.0);
        assert_eq!(clock.ticks(), 960);
        // twice as slow from here on
        clock.set_tempo(1_000_000);
        clock.update(2.0);
        assert_eq!(clock.ticks(), 960 + 480);
        clock.update(1.5);
        assert_eq!(clock.ticks(), 1440);
    }

    #[test]
    fn test_clock_timecode() {
        let mut clock = PlaybackClock::new(Timing::Timecode {
            frames_per_second: 25,
            ticks_per_frame: 40,
        });
        clock.set_tempo(250_000);
        clock.update(0.5);
        assert_eq!(clock.ticks(), 500);
    }
}
