// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

use log::{debug, trace, warn};

use crate::midi::{
    ChannelMessage, Event, KeySignature, Meta, SmpteOffset, TimeSignature, TimedEvent, Timing,
};
use crate::note::{describe_chord, Note};
use crate::schedule::{PlaybackClock, ScheduledQueue};
use crate::synth::Sampler;
use crate::tuning::{TunedNote, Tuner};

use super::Channel;

pub const CHANNEL_COUNT: usize = 16;

/// Plays a stream of events on the 16 channels, retuning the sounding notes whenever they change.
pub struct Channels {
    channels: Vec<Channel>,
    queue: ScheduledQueue<Event>,
    clock: PlaybackClock,
    /// Channel that informational meta events are addressed to.
    meta_channel: usize,
    time_signature: TimeSignature,
    key_signature: Option<KeySignature>,
    smpte_offset: Option<SmpteOffset>,
    tuner: Box<dyn Tuner>,
    /// Sorted notes held on any channel after the latest batch of events.
    on_notes: Vec<u8>,
    /// Frequencies the notes were last tuned to.
    tuning: Vec<TunedNote>,
    ended: bool,
}

impl Channels {
    pub fn new(events: Vec<TimedEvent>, timing: Timing, tuner: Box<dyn Tuner>) -> Self {
        let mut queue = ScheduledQueue::new();
        for TimedEvent { time, event } in events {
            queue.schedule(time, event);
        }
        Self {
            channels: (0..CHANNEL_COUNT as u8).map(Channel::new).collect(),
            queue,
            clock: PlaybackClock::new(timing),
            meta_channel: 0,
            time_signature: TimeSignature::default(),
            key_signature: None,
            smpte_offset: None,
            tuner,
            on_notes: Vec::new(),
            tuning: Vec::new(),
            ended: false,
        }
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn on_notes(&self) -> &[u8] {
        &self.on_notes
    }

    pub fn tuning(&self) -> &[TunedNote] {
        &self.tuning
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn key_signature(&self) -> Option<KeySignature> {
        self.key_signature
    }

    pub fn smpte_offset(&self) -> Option<SmpteOffset> {
        self.smpte_offset
    }

    pub fn has_pending_events(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Advance playback to an absolute number of seconds, applying all events due until then.
    ///
    /// Events sharing a tick form a batch. Voices that have fallen silent are removed
    /// before each batch, and the sounding notes are retuned after it.
    pub fn update_time(&mut self, seconds: f64, sampler: &mut Sampler) {
        self.remove_finished(sampler);
        self.clock.update(seconds);
        let now = self.clock.ticks();
        while let Some(time) = self.queue.next_time() {
            if time > now {
                break;
            }
            self.remove_finished(sampler);
            for event in self.queue.advance_to(time) {
                self.apply(event, sampler);
            }
            self.retune(sampler);
        }

        if self.queue.is_empty() && !self.ended {
            self.ended = true;
            self.release_remaining(sampler);
            self.retune(sampler);
        }
    }

    fn apply(&mut self, event: Event, sampler: &mut Sampler) {
        trace!("{:.3}s: {:?}", self.clock.seconds(), event);
        match event {
            Event::Channel { channel, message } => self.apply_message(channel, message, sampler),
            Event::Meta(meta) => self.apply_meta(meta),
            Event::SysEx { kind, data } => {
                trace!("ignoring system exclusive {:#x} of {} bytes", kind, data.len());
            }
        }
    }

    fn apply_message(&mut self, channel: u8, message: ChannelMessage, sampler: &mut Sampler) {
        let index = usize::from(channel & 0x0f);
        match message {
            ChannelMessage::NoteOn { note, velocity } if velocity > 0 => {
                let frequency = self.tuner.provisional_frequency(note);
                self.channels[index].press(note, velocity, frequency, sampler);
            }
            ChannelMessage::NoteOn { note, .. } | ChannelMessage::NoteOff { note, .. } => {
                self.channels[index].release(note, sampler);
            }
            ChannelMessage::PolyAftertouch { note, pressure } => {
                self.channels[index].poly_aftertouch(note, pressure)
            }
            ChannelMessage::Controller { control, value } => {
                if !self.channels[index].control(control, value) {
                    trace!("channel {}: ignoring controller {:#x}", index, control);
                }
            }
            ChannelMessage::ProgramChange { program } => {
                self.channels[index].set_program(program)
            }
            ChannelMessage::ChannelAftertouch { pressure } => {
                self.channels[index].channel_aftertouch(pressure)
            }
            ChannelMessage::PitchBend { value } => self.channels[index].bend(value),
        }
    }

    fn apply_meta(&mut self, meta: Meta) {
        match meta {
            Meta::Tempo { micros_per_beat } => self.clock.set_tempo(micros_per_beat),
            Meta::TimeSignature(signature) => self.time_signature = signature,
            Meta::KeySignature(signature) => self.key_signature = Some(signature),
            Meta::SmpteOffset(offset) => self.smpte_offset = Some(offset),
            Meta::ChannelPrefix(channel) => self.meta_channel = usize::from(channel & 0x0f),
            Meta::EndOfTrack => {}
            Meta::Unknown { kind, .. } => trace!("ignoring meta event {:#x}", kind),
            meta @ Meta::Text { .. }
            | meta @ Meta::SequenceNumber(_)
            | meta @ Meta::SequencerSpecific(_) => self.channels[self.meta_channel].push_meta(meta),
        }
    }

    /// Tune the held notes again if they changed.
    fn retune(&mut self, sampler: &mut Sampler) {
        let mut notes: Vec<u8> = self
            .channels
            .iter()
            .flat_map(|channel| channel.held_notes())
            .collect();
        notes.sort_unstable();
        notes.dedup();
        if notes == self.on_notes {
            return;
        }

        if !notes.is_empty() {
            let sustained: Vec<TunedNote> = self
                .tuning
                .iter()
                .filter(|tuned| {
                    self.on_notes.contains(&tuned.note) && notes.contains(&tuned.note)
                })
                .copied()
                .collect();
            let tuned = self.tuner.tune(&notes, &sustained);
            for channel in self.channels.iter_mut() {
                channel.retune(&tuned, sampler);
            }
            self.tuning = tuned;
        }
        debug!(
            "{:.3}s: {} sounding",
            self.clock.seconds(),
            describe_chord(&notes)
        );
        self.on_notes = notes;
    }

    fn remove_finished(&mut self, sampler: &mut Sampler) {
        for channel in self.channels.iter_mut() {
            channel.remove_finished(sampler);
        }
    }

    /// Release whatever is still held once no more events will come.
    fn release_remaining(&mut self, sampler: &mut Sampler) {
        for channel in self.channels.iter_mut() {
            for note in channel.release_held(sampler) {
                warn!(
                    "channel {}: {} still held at the end, releasing it",
                    channel.index(),
                    Note::from_midi(note)
                );
            }
        }
    }
}
