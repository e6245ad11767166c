// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! `entune` renders a MIDI file to raw stereo PCM, tuning every chord to pure intervals.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info};
use signal_hook::consts::SIGINT;
use simple_logger;
use snafu::ResultExt;
use structopt::StructOpt;

use entune::config::{Endianness, PitchStandard, RenderConfig, SampleDepth, SampleFormat};
use entune::output::interleave;
use entune::render::{self, load_midi, ChannelRenderer, RenderError};
use entune::tuning::Temperament;
use entune::wave::{Side, Stereo};

#[derive(Debug, StructOpt)]
#[structopt(name = "entune", about = "Rendering MIDI files in dynamic just intonation")]
struct Opt {
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// The MIDI file to render.
    #[structopt(parse(from_os_str))]
    input: PathBuf,

    /// Raw interleaved PCM output. Defaults to the input with a `.raw` extension.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Samples per second and side.
    #[structopt(long, default_value = "48000")]
    rate: u32,

    /// Bits per sample (8, 16, 24 or 32).
    #[structopt(long, default_value = "16")]
    depth: u32,

    /// Byte order of the samples (little, big or native).
    #[structopt(long, default_value = "little")]
    endianness: Endianness,

    /// dynamic, equal, just, pythagorean, well or bechstein.
    #[structopt(long, default_value = "dynamic")]
    temperament: Temperament,

    /// Frequency of A4 (440 or 415). Defaults to the one of the temperament.
    #[structopt(long)]
    pitch_standard: Option<PitchStandard>,

    /// Steps per octave of the harmonic table.
    #[structopt(long, default_value = "12")]
    notes_per_octave: u32,

    /// Octaves of the harmonic series considered when tuning chords.
    #[structopt(long, default_value = "4")]
    max_octaves: u32,

    /// Complete candidate tunings examined before the search gives up.
    #[structopt(long, default_value = "30000")]
    max_paths: usize,

    /// Number of chord tunings remembered.
    #[structopt(long, default_value = "4096")]
    cache_size: usize,

    /// Samples buffered per side between the renderers and the writer.
    #[structopt(long, default_value = "4096")]
    queue_depth: usize,
}

impl Opt {
    fn config(&self) -> Result<RenderConfig, RenderError> {
        let depth = SampleDepth::from_bits(self.depth).context(render::Config)?;
        Ok(RenderConfig {
            sample_rate: self.rate,
            format: SampleFormat {
                depth,
                endianness: self.endianness,
            },
            temperament: self.temperament,
            pitch_standard: self.pitch_standard,
            notes_per_octave: self.notes_per_octave,
            max_octaves: self.max_octaves,
            max_search_paths: self.max_paths,
            cache_size: self.cache_size,
        })
    }
}

fn main() {
    let opt = Opt::from_args();

    let level = match opt.verbose {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    if let Err(err) = simple_logger::init_with_level(level) {
        eprintln!("Could not initialize logging: {}", err);
    }

    if let Err(err) = run(opt) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), RenderError> {
    let config = opt.config()?;
    config.validate().context(render::Config)?;
    let midi = load_midi(&opt.input)?;
    let output = opt
        .output
        .clone()
        .unwrap_or_else(|| opt.input.with_extension("raw"));
    info!(
        "rendering {} to {} ({} Hz, {} bit, {:?})",
        opt.input.display(),
        output.display(),
        config.sample_rate,
        config.format.depth.bits(),
        config.temperament
    );

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&stop)).context(render::Signal)?;

    let renderers = Stereo::new(
        ChannelRenderer::new(&midi, Side::Left, &config)?,
        ChannelRenderer::new(&midi, Side::Right, &config)?,
    );
    let Stereo {
        left: (left_in, left),
        right: (right_in, right),
    } = Stereo::from_fn(|_| crossbeam_channel::bounded(opt.queue_depth.max(1)));

    let mut workers = Vec::new();
    let mut result = Ok(0);
    for (renderer, sender) in vec![(renderers.left, left_in), (renderers.right, right_in)] {
        let side = renderer.side();
        let stop = Arc::clone(&stop);
        let spawned = thread::Builder::new()
            .name(format!("render-{}", side))
            .spawn(move || render::perform(renderer, sender, &stop))
            .context(render::Spawn { side });
        match spawned {
            Ok(handle) => workers.push((side, handle)),
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }

    if result.is_ok() {
        result = File::create(&output)
            .context(render::WriteOutput { path: &output })
            .and_then(|file| {
                let mut writer = BufWriter::new(file);
                interleave(&left, &right, &mut writer, &config.format.silence())
                    .context(render::WriteOutput { path: &output })
            });
    }
    if result.is_err() {
        stop.store(true, Ordering::Relaxed);
    }
    // unblocks workers waiting on a full queue
    drop(left);
    drop(right);

    let joined = join(workers);
    let frames = result?;
    joined?;
    if stop.load(Ordering::Relaxed) {
        info!("interrupted after {} frames", frames);
    } else {
        info!("wrote {} frames to {}", frames, output.display());
    }
    Ok(())
}

fn join(workers: Vec<(Side, JoinHandle<u64>)>) -> Result<(), RenderError> {
    let mut result = Ok(());
    for (side, handle) in workers {
        if handle.join().is_err() && result.is_ok() {
            result = render::WorkerPanic { side }.fail();
        }
    }
    result
}
