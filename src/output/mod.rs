// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Writing the rendered sides as raw interleaved PCM.

use std::io::{self, Write};

use crossbeam_channel::Receiver;
use log::debug;

/// A queue of packed samples, terminated by `None`.
pub type SampleQueue = Receiver<Option<Vec<u8>>>;

/// Next sample of a side, or `None` once the side has ended.
/// A disconnected queue counts as ended.
fn next(queue: &SampleQueue, ended: &mut bool) -> Option<Vec<u8>> {
    if *ended {
        return None;
    }
    match queue.recv() {
        Ok(Some(sample)) => Some(sample),
        Ok(None) | Err(_) => {
            *ended = true;
            None
        }
    }
}

/// Interleave the samples of both sides into `writer`, left first.
///
/// When one side ends before the other, it is padded with `silence`.
/// Returns the number of frames written.
///
/// # Example
///
/// ```
/// use entune::output::interleave;
///
/// let (left_in, left) = crossbeam_channel::unbounded();
/// let (right_in, right) = crossbeam_channel::unbounded();
/// left_in.send(Some(vec![1])).unwrap();
/// left_in.send(None).unwrap();
/// right_in.send(Some(vec![2])).unwrap();
/// right_in.send(Some(vec![3])).unwrap();
/// right_in.send(None).unwrap();
///
/// let mut out = Vec::new();
/// assert_eq!(interleave(&left, &right, &mut out, &[0]).unwrap(), 2);
/// assert_eq!(out, vec![1, 2, 0, 3]);
/// ```
pub fn interleave<W: Write>(
    left: &SampleQueue,
    right: &SampleQueue,
    writer: &mut W,
    silence: &[u8],
) -> io::Result<u64> {
    let mut left_ended = false;
    let mut right_ended = false;
    let mut frames = 0;
    loop {
        let l = next(left, &mut left_ended);
        let r = next(right, &mut right_ended);
        if l.is_none() && r.is_none() {
            break;
        }
        writer.write_all(l.as_deref().unwrap_or(silence))?;
        writer.write_all(r.as_deref().unwrap_or(silence))?;
        frames += 1;
    }
    writer.flush()?;
    debug!("wrote {} frames", frames);
    Ok(frames)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_disconnected_side_is_padded() {
        let (left_in, left) = crossbeam_channel::unbounded();
        let (right_in, right) = crossbeam_channel::unbounded::<Option<Vec<u8>>>();
        for value in 1..=3u8 {
            left_in.send(Some(vec![value, value])).unwrap();
        }
        drop(left_in);
        drop(right_in);

        let mut out = Vec::new();
        assert_eq!(interleave(&left, &right, &mut out, &[0, 0]).unwrap(), 3);
        assert_eq!(out, vec![1, 1, 0, 0, 2, 2, 0, 0, 3, 3, 0, 0]);
    }

    #[test]
    fn test_empty_sides() {
        let (left_in, left) = crossbeam_channel::unbounded();
        let (right_in, right) = crossbeam_channel::unbounded();
        left_in.send(None).unwrap();
        right_in.send(None).unwrap();
        let mut out = Vec::new();
        assert_eq!(interleave(&left, &right, &mut out, &[0]).unwrap(), 0);
        assert!(out.is_empty());
    }
}
