// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The events contained in a track.

/// An event together with the absolute tick it occurs at.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    pub time: u64,
    pub event: Event,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Channel { channel: u8, message: ChannelMessage },
    Meta(Meta),
    /// Raw system exclusive data, `kind` being either `0xF0` or `0xF7`.
    SysEx { kind: u8, data: Vec<u8> },
}

/// Messages addressed to one of the 16 MIDI channels.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelMessage {
    NoteOff { note: u8, velocity: u8 },
    NoteOn { note: u8, velocity: u8 },
    PolyAftertouch { note: u8, pressure: u8 },
    Controller { control: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelAftertouch { pressure: u8 },
    /// 14 bit value, centered at `0x2000`.
    PitchBend { value: u16 },
}

impl ChannelMessage {
    /// Number of data bytes following a status byte with this high nibble.
    pub fn data_len(status: u8) -> usize {
        match status & 0xf0 {
            0xc0 | 0xd0 => 1,
            _ => 2,
        }
    }

    /// Decode the message belonging to a channel status byte.
    /// `data` must contain `data_len(status)` bytes.
    pub fn decode(status: u8, data: &[u8]) -> Option<ChannelMessage> {
        let first = *data.get(0)? & 0x7f;
        let second = || data.get(1).map(|b| b & 0x7f);
        let message = match status & 0xf0 {
            0x80 => ChannelMessage::NoteOff {
                note: first,
                velocity: second()?,
            },
            0x90 => ChannelMessage::NoteOn {
                note: first,
                velocity: second()?,
            },
            0xa0 => ChannelMessage::PolyAftertouch {
                note: first,
                pressure: second()?,
            },
            0xb0 => ChannelMessage::Controller {
                control: first,
                value: second()?,
            },
            0xc0 => ChannelMessage::ProgramChange { program: first },
            0xd0 => ChannelMessage::ChannelAftertouch { pressure: first },
            0xe0 => ChannelMessage::PitchBend {
                value: u16::from(first) | u16::from(second()?) << 7,
            },
            _ => return None,
        };
        Some(message)
    }
}

/// Kinds of the free-form text meta events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TextKind {
    Text,
    Copyright,
    TrackName,
    InstrumentName,
    Lyric,
    Marker,
    CuePoint,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Power of two of the denominator, i.e. 2 means quarter notes.
    pub denominator_power: u8,
    pub clocks_per_click: u8,
    pub thirty_seconds_per_quarter: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator_power: 2,
            clocks_per_click: 24,
            thirty_seconds_per_quarter: 8,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct KeySignature {
    /// Number of sharps, negative for flats.
    pub sharps: i8,
    pub minor: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SmpteOffset {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub hundredths: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Meta {
    SequenceNumber(u16),
    Text { kind: TextKind, text: String },
    ChannelPrefix(u8),
    EndOfTrack,
    Tempo { micros_per_beat: u32 },
    SmpteOffset(SmpteOffset),
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    SequencerSpecific(Vec<u8>),
    /// A meta event of unknown type, or with a payload too short for its type.
    Unknown { kind: u8, data: Vec<u8> },
}

impl Meta {
    /// Decode the payload of a meta event of the given type.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::midi::*;
    ///
    /// assert_eq!(
    ///     Meta::decode(0x51, &[0x07, 0xa1, 0x20]),
    ///     Meta::Tempo { micros_per_beat: 500_000 }
    /// );
    /// assert_eq!(Meta::decode(0x51, &[0x07]), Meta::Unknown { kind: 0x51, data: vec![0x07] });
    /// ```
    pub fn decode(kind: u8, data: &[u8]) -> Meta {
        let unknown = || Meta::Unknown {
            kind,
            data: data.to_vec(),
        };
        let text = |kind| Meta::Text {
            kind,
            text: String::from_utf8_lossy(data).into_owned(),
        };
        match kind {
            0x00 if data.len() >= 2 => {
                Meta::SequenceNumber(u16::from(data[0]) << 8 | u16::from(data[1]))
            }
            0x01 => text(TextKind::Text),
            0x02 => text(TextKind::Copyright),
            0x03 => text(TextKind::TrackName),
            0x04 => text(TextKind::InstrumentName),
            0x05 => text(TextKind::Lyric),
            0x06 => text(TextKind::Marker),
            0x07 => text(TextKind::CuePoint),
            0x20 if !data.is_empty() => Meta::ChannelPrefix(data[0] & 0x0f),
            0x2f => Meta::EndOfTrack,
            0x51 if data.len() >= 3 => Meta::Tempo {
                micros_per_beat: u32::from(data[0]) << 16
                    | u32::from(data[1]) << 8
                    | u32::from(data[2]),
            },
            0x54 if data.len() >= 5 => Meta::SmpteOffset(SmpteOffset {
                hours: data[0],
                minutes: data[1],
                seconds: data[2],
                frames: data[3],
                hundredths: data[4],
            }),
            0x58 if data.len() >= 4 => Meta::TimeSignature(TimeSignature {
                numerator: data[0],
                denominator_power: data[1],
                clocks_per_click: data[2],
                thirty_seconds_per_quarter: data[3],
            }),
            0x59 if data.len() >= 2 => Meta::KeySignature(KeySignature {
                sharps: data[0] as i8,
                minor: data[1] != 0,
            }),
            0x7f => Meta::SequencerSpecific(data.to_vec()),
            _ => unknown(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_channel_messages() {
        assert_eq!(
            ChannelMessage::decode(0x93, &[69, 100]),
            Some(ChannelMessage::NoteOn {
                note: 69,
                velocity: 100
            })
        );
        assert_eq!(
            ChannelMessage::decode(0xe0, &[0x00, 0x40]),
            Some(ChannelMessage::PitchBend { value: 0x2000 })
        );
        assert_eq!(
            ChannelMessage::decode(0xc5, &[41]),
            Some(ChannelMessage::ProgramChange { program: 41 })
        );
        assert_eq!(ChannelMessage::decode(0x80, &[60]), None);
        assert_eq!(ChannelMessage::data_len(0xd2), 1);
        assert_eq!(ChannelMessage::data_len(0xb2), 2);
    }

    #[test]
    fn test_meta_events() {
        assert_eq!(
            Meta::decode(0x03, b"Piano"),
            Meta::Text {
                kind: TextKind::TrackName,
                text: "Piano".to_string()
            }
        );
        assert_eq!(
            Meta::decode(0x59, &[0xfd, 1]),
            Meta::KeySignature(KeySignature {
                sharps: -3,
                minor: true
            })
        );
        assert_eq!(Meta::decode(0x20, &[0x19]), Meta::ChannelPrefix(9));
        assert_eq!(Meta::decode(0x2f, &[]), Meta::EndOfTrack);
    }
}
