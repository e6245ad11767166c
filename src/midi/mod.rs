// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Reading standard MIDI files.
//!
//! Only format 1 files (several simultaneous tracks) are supported.
//! All integers in the chunk structure are big endian.

use log::{debug, warn};
use snafu::{ensure, Snafu};

mod event;
mod track;

pub use self::event::*;
pub use self::track::{encode_vlq, read_vlq, TrackCursor, VLQ_MAX};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParseError {
    #[snafu(display("The file does not contain a MThd header chunk"))]
    MissingHeader,
    #[snafu(display("Header chunk at offset {} has length {}, expected 6", offset, length))]
    BadHeaderLength { offset: usize, length: usize },
    #[snafu(display("Header chunk at offset {} has an empty time division {:#06x}", offset, division))]
    BadDivision { offset: usize, division: u16 },
    #[snafu(display("Unsupported MIDI format {}, only format 1 is supported", format))]
    UnsupportedFormat { format: u16 },
    #[snafu(display("Incomplete chunk header at offset {}", offset))]
    TruncatedChunkHeader { offset: usize },
    #[snafu(display(
        "Chunk '{}' at offset {} declares {} bytes but only {} remain",
        id,
        offset,
        size,
        remaining
    ))]
    ChunkOverrun {
        id: String,
        offset: usize,
        size: usize,
        remaining: usize,
    },
    #[snafu(display(
        "Event payload at offset {} declares {} bytes but only {} remain in the track",
        offset,
        declared,
        remaining
    ))]
    LengthOverrun {
        offset: usize,
        declared: usize,
        remaining: usize,
    },
    #[snafu(display("Event at offset {} is cut off by the end of the track", offset))]
    TruncatedEvent { offset: usize },
    #[snafu(display("Data byte at offset {} without a preceding status byte", offset))]
    MissingStatus { offset: usize },
    #[snafu(display("Unsupported status byte {:#04x} at offset {}", status, offset))]
    UnknownStatus { offset: usize, status: u8 },
    #[snafu(display("Variable length quantity at offset {} exceeds four bytes", offset))]
    VlqOverflow { offset: usize },
}

/// How ticks relate to time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Timing {
    /// Ticks are fractions of a beat whose length is given by the tempo.
    Metrical { ticks_per_beat: u16 },
    /// Ticks are fractions of SMPTE frames, independent of the tempo.
    Timecode {
        frames_per_second: u8,
        ticks_per_frame: u8,
    },
}

impl Timing {
    /// Decode the time division field of the header.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::midi::*;
    ///
    /// assert_eq!(Timing::from_division(480), Timing::Metrical { ticks_per_beat: 480 });
    /// assert_eq!(
    ///     Timing::from_division(0xe728),
    ///     Timing::Timecode { frames_per_second: 25, ticks_per_frame: 40 }
    /// );
    /// ```
    pub fn from_division(division: u16) -> Timing {
        if division & 0x8000 == 0 {
            Timing::Metrical {
                ticks_per_beat: division,
            }
        } else {
            // the frame rate is stored as negative two's complement number
            let fps = ((division >> 8) as u8 as i8).wrapping_neg();
            Timing::Timecode {
                frames_per_second: fps as u8,
                ticks_per_frame: (division & 0xff) as u8,
            }
        }
    }

    /// A division without ticks, under which time never advances.
    pub fn is_empty(self) -> bool {
        match self {
            Timing::Metrical { ticks_per_beat } => ticks_per_beat == 0,
            Timing::Timecode {
                frames_per_second,
                ticks_per_frame,
            } => frames_per_second == 0 || ticks_per_frame == 0,
        }
    }

    /// Ticks per second at the given tempo.
    ///
    /// ```
    /// use entune::midi::*;
    ///
    /// let timing = Timing::Metrical { ticks_per_beat: 480 };
    /// assert_eq!(timing.ticks_per_second(500_000), 960.0);
    /// ```
    pub fn ticks_per_second(self, micros_per_beat: u32) -> f64 {
        match self {
            Timing::Metrical { ticks_per_beat } => {
                f64::from(ticks_per_beat) * 1_000_000.0 / f64::from(micros_per_beat.max(1))
            }
            Timing::Timecode {
                frames_per_second,
                ticks_per_frame,
            } => {
                let fps = if frames_per_second == 29 {
                    29.97
                } else {
                    f64::from(frames_per_second)
                };
                fps * f64::from(ticks_per_frame)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Header {
    pub format: u16,
    pub track_count: u16,
    pub timing: Timing,
}

/// The raw bytes of one track chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    /// Position of the track data within the file.
    offset: usize,
    data: Vec<u8>,
}

impl Track {
    /// Iterate over the events of the track.
    /// Every call starts again from the beginning of the track.
    pub fn events(&self) -> TrackCursor<'_> {
        TrackCursor::new(&self.data, self.offset)
    }
}

/// A parsed MIDI file.
#[derive(Clone, Debug, PartialEq)]
pub struct MidiFile {
    pub header: Header,
    pub tracks: Vec<Track>,
}

impl MidiFile {
    /// Split a MIDI file into its header and track chunks.
    ///
    /// Track contents are only decoded when iterating them.
    /// Chunks of unknown type are skipped.
    pub fn parse(bytes: &[u8]) -> Result<MidiFile, ParseError> {
        let mut header = None;
        let mut tracks = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            ensure!(
                bytes.len() - pos >= 8,
                TruncatedChunkHeader { offset: pos }
            );
            let id = &bytes[pos..pos + 4];
            let size = u32::from_be_bytes([
                bytes[pos + 4],
                bytes[pos + 5],
                bytes[pos + 6],
                bytes[pos + 7],
            ]) as usize;
            let body_offset = pos + 8;
            let remaining = bytes.len() - body_offset;
            ensure!(
                size <= remaining,
                ChunkOverrun {
                    id: String::from_utf8_lossy(id),
                    offset: pos,
                    size,
                    remaining,
                }
            );
            let body = &bytes[body_offset..body_offset + size];

            match id {
                b"MThd" => header = Some(parse_header(body, pos)?),
                b"MTrk" => tracks.push(Track {
                    offset: body_offset,
                    data: body.to_vec(),
                }),
                _ => debug!(
                    "skipping unknown chunk '{}' of {} bytes",
                    String::from_utf8_lossy(id),
                    size
                ),
            }
            pos = body_offset + size;
        }

        let header = header.ok_or(ParseError::MissingHeader)?;
        if usize::from(header.track_count) != tracks.len() {
            warn!(
                "header announces {} tracks, but the file contains {}",
                header.track_count,
                tracks.len()
            );
        }
        Ok(MidiFile { header, tracks })
    }

    /// Decode all tracks and merge them into one stream ordered by time.
    /// Events at the same time keep the order of their tracks.
    pub fn events(&self) -> Result<Vec<TimedEvent>, ParseError> {
        let mut events = Vec::new();
        for track in &self.tracks {
            for event in track.events() {
                events.push(event?);
            }
        }
        events.sort_by_key(|event| event.time);
        Ok(events)
    }
}

fn parse_header(body: &[u8], offset: usize) -> Result<Header, ParseError> {
    ensure!(
        body.len() == 6,
        BadHeaderLength {
            offset,
            length: body.len()
        }
    );
    let word = |i: usize| u16::from_be_bytes([body[i], body[i + 1]]);
    let format = word(0);
    ensure!(format == 1, UnsupportedFormat { format });
    let division = word(4);
    let timing = Timing::from_division(division);
    ensure!(!timing.is_empty(), BadDivision { offset, division });
    Ok(Header {
        format,
        track_count: word(2),
        timing,
    })
}

/// Assemble a chunk from its id and body.
#[cfg(test)]
pub(crate) fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
    bytes.extend_from_slice(body);
    bytes
}

/// Assemble a format 1 file from track bodies.
#[cfg(test)]
pub(crate) fn format1_file(ticks_per_beat: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut header = vec![0, 1];
    header.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    header.extend_from_slice(&ticks_per_beat.to_be_bytes());
    let mut bytes = chunk(b"MThd", &header);
    for track in tracks {
        bytes.extend(chunk(b"MTrk", track));
    }
    bytes
}

/// Build a track body from `(delta, event bytes)` pairs.
#[cfg(test)]
pub(crate) fn track_body(events: &[(u32, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (delta, bytes) in events {
        body.extend(encode_vlq(*delta));
        body.extend_from_slice(bytes);
    }
    body
}
