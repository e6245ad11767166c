// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The glue turning a MIDI file into the samples of one side of the output.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use log::{debug, info};
use snafu::{ResultExt, Snafu};

use crate::channel::Channels;
use crate::config::{ConfigError, RenderConfig};
use crate::midi::{MidiFile, ParseError};
use crate::synth::Sampler;
use crate::tuning::tuner_for;
use crate::wave::Side;

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub")]
pub enum RenderError {
    #[snafu(display("Could not read {}: {}", path.display(), source))]
    ReadMidi { path: PathBuf, source: io::Error },
    #[snafu(display("Invalid MIDI file: {}", source))]
    Parse { source: ParseError },
    #[snafu(display("Invalid configuration: {}", source))]
    Config { source: ConfigError },
    #[snafu(display("Could not write {}: {}", path.display(), source))]
    WriteOutput { path: PathBuf, source: io::Error },
    #[snafu(display("Could not register the interrupt handler: {}", source))]
    Signal { source: io::Error },
    #[snafu(display("Could not start the {} renderer: {}", side, source))]
    Spawn { side: Side, source: io::Error },
    #[snafu(display("The {} renderer panicked", side))]
    WorkerPanic { side: Side },
}

/// Read and parse a MIDI file.
pub fn load_midi(path: &Path) -> Result<MidiFile, RenderError> {
    let bytes = std::fs::read(path).context(ReadMidi { path })?;
    MidiFile::parse(&bytes).context(Parse)
}

/// Renders one side of the output, one sample at a time.
///
/// Every renderer owns its own copy of the events, voices and tuning cache,
/// so the two sides can be rendered in parallel without sharing anything.
pub struct ChannelRenderer {
    side: Side,
    sample_rate: u32,
    channels: Channels,
    sampler: Sampler,
}

impl ChannelRenderer {
    pub fn new(
        midi: &MidiFile,
        side: Side,
        config: &RenderConfig,
    ) -> Result<ChannelRenderer, RenderError> {
        config.validate().context(Config)?;
        let events = midi.events().context(Parse)?;
        debug!("{} renderer: {} events", side, events.len());
        Ok(ChannelRenderer {
            side,
            sample_rate: config.sample_rate,
            channels: Channels::new(events, midi.header.timing, tuner_for(config)),
            sampler: Sampler::new(side, config.sample_rate, config.format),
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// The packed sample with the given index.
    /// Indices are expected to be requested in increasing order.
    pub fn next_sample(&mut self, index: u64) -> Vec<u8> {
        let second = index as f64 / f64::from(self.sample_rate);
        self.channels.update_time(second, &mut self.sampler);
        self.sampler.sample(second)
    }

    /// `false` once all events have been played and every tone has finished.
    pub fn remaining(&self) -> bool {
        self.channels.has_pending_events() || self.sampler.sounding()
    }
}

/// Render samples into a queue until the renderer is done or `stop` is set.
///
/// The end of the stream is marked by `None`. Returns the number of samples rendered.
pub fn perform(
    mut renderer: ChannelRenderer,
    output: Sender<Option<Vec<u8>>>,
    stop: &AtomicBool,
) -> u64 {
    let side = renderer.side();
    let rate = u64::from(renderer.sample_rate().max(1));
    let mut index = 0;
    while renderer.remaining() {
        if stop.load(Ordering::Relaxed) {
            info!("{} renderer interrupted", side);
            break;
        }
        let sample = renderer.next_sample(index);
        if output.send(Some(sample)).is_err() {
            debug!("{} renderer: output closed", side);
            return index;
        }
        index += 1;
        if index % rate == 0 {
            debug!("{} renderer: {} s", side, index / rate);
        }
    }
    if output.send(None).is_err() {
        debug!("{} renderer: output closed", side);
    }
    info!(
        "{} renderer finished after {} samples ({:.2} s)",
        side,
        index,
        index as f64 / rate as f64
    );
    index
}
