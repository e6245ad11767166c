// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Decoding the event stream of a single track chunk.

use snafu::ensure;

use super::event::{ChannelMessage, Event, Meta, TimedEvent};
use super::{
    LengthOverrun, MissingStatus, ParseError, TruncatedEvent, UnknownStatus, VlqOverflow,
};

/// Largest value representable by a variable length quantity.
pub const VLQ_MAX: u32 = (1 << 28) - 1;

/// Decode a variable length quantity starting at `*pos`, advancing `pos` past it.
///
/// `offset` is the position of `bytes` within the file and only used for error reporting.
///
/// # Examples
///
/// ```
/// use entune::midi::*;
///
/// let mut pos = 0;
/// assert_eq!(read_vlq(&[0x81, 0x80, 0x00, 0x7f], &mut pos, 0), Ok(0x4000));
/// assert_eq!(pos, 3);
/// ```
pub fn read_vlq(bytes: &[u8], pos: &mut usize, offset: usize) -> Result<u32, ParseError> {
    let start = *pos;
    let mut value = 0u32;
    for i in 0..4 {
        let byte = match bytes.get(start + i) {
            Some(byte) => *byte,
            None => return TruncatedEvent { offset: offset + start }.fail(),
        };
        value = value << 7 | u32::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            *pos = start + i + 1;
            return Ok(value);
        }
    }
    VlqOverflow { offset: offset + start }.fail()
}

/// Encode a value as variable length quantity in its shortest form.
///
/// # Panics
///
/// Panics if the value exceeds [`VLQ_MAX`].
///
/// # Examples
///
/// ```
/// use entune::midi::*;
///
/// assert_eq!(encode_vlq(0), vec![0x00]);
/// assert_eq!(encode_vlq(0x7f), vec![0x7f]);
/// assert_eq!(encode_vlq(0x80), vec![0x81, 0x00]);
/// assert_eq!(encode_vlq(VLQ_MAX), vec![0xff, 0xff, 0xff, 0x7f]);
/// ```
pub fn encode_vlq(value: u32) -> Vec<u8> {
    assert!(value <= VLQ_MAX, "value does not fit into four bytes");
    let mut bytes = vec![(value & 0x7f) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        bytes.push((rest & 0x7f) as u8 | 0x80);
        rest >>= 7;
    }
    bytes.reverse();
    bytes
}

/// Iterator over the events of one track, in the order they are stored.
///
/// Delta times are accumulated into absolute tick times.
/// The cursor ends exactly at the end of the track data and stops after the first error.
pub struct TrackCursor<'a> {
    data: &'a [u8],
    /// Position of `data` within the file, for diagnostics.
    offset: usize,
    pos: usize,
    time: u64,
    running_status: Option<u8>,
    failed: bool,
}

impl<'a> TrackCursor<'a> {
    pub fn new(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            offset,
            pos: 0,
            time: 0,
            running_status: None,
            failed: false,
        }
    }

    fn byte(&mut self) -> Result<u8, ParseError> {
        let byte = *self.data.get(self.pos).ok_or(ParseError::TruncatedEvent {
            offset: self.offset + self.pos,
        })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a length prefixed payload of a meta or system exclusive event.
    fn payload(&mut self) -> Result<&'a [u8], ParseError> {
        let declared = read_vlq(self.data, &mut self.pos, self.offset)? as usize;
        let remaining = self.data.len() - self.pos;
        ensure!(
            declared <= remaining,
            LengthOverrun {
                offset: self.offset + self.pos,
                declared,
                remaining,
            }
        );
        let data = self.data;
        let payload = &data[self.pos..self.pos + declared];
        self.pos += declared;
        Ok(payload)
    }

    fn next_event(&mut self) -> Result<TimedEvent, ParseError> {
        let delta = read_vlq(self.data, &mut self.pos, self.offset)?;
        self.time += u64::from(delta);

        let status_offset = self.offset + self.pos;
        let peeked = *self.data.get(self.pos).ok_or(ParseError::TruncatedEvent {
            offset: status_offset,
        })?;
        let status = if peeked & 0x80 == 0 {
            // running status, the byte is already data
            self.running_status.ok_or(ParseError::MissingStatus {
                offset: status_offset,
            })?
        } else {
            self.pos += 1;
            peeked
        };

        let event = match status {
            0xff => {
                let kind = self.byte()?;
                Event::Meta(Meta::decode(kind, self.payload()?))
            }
            0xf0 | 0xf7 => Event::SysEx {
                kind: status,
                data: self.payload()?.to_vec(),
            },
            0xf1..=0xfe => {
                return UnknownStatus {
                    offset: status_offset,
                    status,
                }
                .fail()
            }
            _ => {
                self.running_status = Some(status);
                let mut data = [0u8; 2];
                let len = ChannelMessage::data_len(status);
                for slot in data.iter_mut().take(len) {
                    *slot = self.byte()?;
                }
                let message = ChannelMessage::decode(status, &data[..len]).ok_or(
                    ParseError::TruncatedEvent {
                        offset: status_offset,
                    },
                )?;
                Event::Channel {
                    channel: status & 0x0f,
                    message,
                }
            }
        };

        Ok(TimedEvent {
            time: self.time,
            event,
        })
    }
}

impl<'a> Iterator for TrackCursor<'a> {
    type Item = Result<TimedEvent, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let result = self.next_event();
        self.failed = result.is_err();
        Some(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::midi::ChannelMessage::*;

    #[test]
    fn test_vlq_roundtrip_boundaries() {
        let mut values = vec![0, 1, 0x7f, 0x80, 0x3fff, 0x4000, 0x1f_ffff, 0x20_0000];
        values.push(VLQ_MAX);
        // a spread of values across the whole range
        values.extend((0..1000u32).map(|i| i.wrapping_mul(268_435)));
        for value in values {
            let bytes = encode_vlq(value);
            let mut pos = 0;
            assert_eq!(read_vlq(&bytes, &mut pos, 0), Ok(value));
            assert_eq!(pos, bytes.len());
        }
    }

    #[test]
    fn test_vlq_errors() {
        let mut pos = 0;
        assert_eq!(
            read_vlq(&[0x80, 0x80, 0x80, 0x80, 0x00], &mut pos, 10),
            Err(ParseError::VlqOverflow { offset: 10 })
        );
        let mut pos = 1;
        assert_eq!(
            read_vlq(&[0x00, 0x81], &mut pos, 0),
            Err(ParseError::TruncatedEvent { offset: 1 })
        );
    }

    #[test]
    fn test_running_status() {
        let data = [
            0x00, 0x90, 60, 100, // note on
            0x10, 64, 90, // running status note on
            0x00, 0xff, 0x51, 0x03, 0x07, 0xa1, 0x20, // tempo does not clear running status
            0x20, 60, 0, // running status note on with zero velocity
        ];
        let events: Vec<TimedEvent> = TrackCursor::new(&data, 0)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[1].time, 0x10);
        assert_eq!(
            events[1].event,
            Event::Channel {
                channel: 0,
                message: NoteOn {
                    note: 64,
                    velocity: 90
                }
            }
        );
        assert_eq!(
            events[2].event,
            Event::Meta(Meta::Tempo {
                micros_per_beat: 500_000
            })
        );
        assert_eq!(events[3].time, 0x30);
        assert_eq!(
            events[3].event,
            Event::Channel {
                channel: 0,
                message: NoteOn {
                    note: 60,
                    velocity: 0
                }
            }
        );
    }

    #[test]
    fn test_missing_status() {
        let data = [0x00, 0x40, 0x40];
        let mut cursor = TrackCursor::new(&data, 22);
        assert_eq!(
            cursor.next(),
            Some(Err(ParseError::MissingStatus { offset: 23 }))
        );
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_unknown_status() {
        let data = [0x00, 0xf3, 0x01];
        let mut cursor = TrackCursor::new(&data, 0);
        assert_eq!(
            cursor.next(),
            Some(Err(ParseError::UnknownStatus {
                offset: 1,
                status: 0xf3
            }))
        );
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_truncated_channel_message() {
        let data = [0x00, 0x90, 60];
        let mut cursor = TrackCursor::new(&data, 0);
        assert_eq!(
            cursor.next(),
            Some(Err(ParseError::TruncatedEvent { offset: 3 }))
        );
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_meta_length_overrun() {
        let data = [0x00, 0xff, 0x03, 0x10, b'a', b'b'];
        let mut cursor = TrackCursor::new(&data, 0);
        assert_eq!(
            cursor.next(),
            Some(Err(ParseError::LengthOverrun {
                offset: 4,
                declared: 16,
                remaining: 2
            }))
        );
    }

    #[test]
    fn test_sysex() {
        let data = [0x05, 0xf0, 0x03, 0x7e, 0x7f, 0xf7, 0x00, 0xc1, 0x05];
        let events: Vec<TimedEvent> = TrackCursor::new(&data, 0)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            events,
            vec![
                TimedEvent {
                    time: 5,
                    event: Event::SysEx {
                        kind: 0xf0,
                        data: vec![0x7e, 0x7f, 0xf7]
                    }
                },
                TimedEvent {
                    time: 5,
                    event: Event::Channel {
                        channel: 1,
                        message: ProgramChange { program: 5 }
                    }
                },
            ]
        );
    }
}
