// entune -- a MIDI renderer with dynamic just intonation
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Settings of a render, fixed when the pipelines are constructed.

use snafu::Snafu;
use std::str::FromStr;

use crate::tuning::Temperament;

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility = "pub(crate)")]
pub enum ConfigError {
    #[snafu(display("The sample rate must be positive"))]
    ZeroSampleRate,
    #[snafu(display("Unsupported sample depth of {} bits (expected 8, 16, 24 or 32)", bits))]
    UnsupportedDepth { bits: u32 },
    #[snafu(display("The octave must be divided into at least one step"))]
    ZeroNotesPerOctave,
    #[snafu(display(
        "Fixed temperaments divide the octave into 12 steps, not {}",
        notes_per_octave
    ))]
    FixedTemperamentOctave { notes_per_octave: u32 },
    #[snafu(display("Unknown {} '{}'", what, value))]
    UnknownName { what: &'static str, value: String },
}

/// Bits per sample of the raw output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SampleDepth {
    Bits8,
    Bits16,
    Bits24,
    Bits32,
}

impl SampleDepth {
    pub fn from_bits(bits: u32) -> Result<SampleDepth, ConfigError> {
        match bits {
            8 => Ok(SampleDepth::Bits8),
            16 => Ok(SampleDepth::Bits16),
            24 => Ok(SampleDepth::Bits24),
            32 => Ok(SampleDepth::Bits32),
            _ => UnsupportedDepth { bits }.fail(),
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            SampleDepth::Bits8 => 8,
            SampleDepth::Bits16 => 16,
            SampleDepth::Bits24 => 24,
            SampleDepth::Bits32 => 32,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

/// Byte order of the packed samples.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Endianness {
    Little,
    Big,
    Native,
}

impl FromStr for Endianness {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "little" | "le" => Ok(Endianness::Little),
            "big" | "be" => Ok(Endianness::Big),
            "native" | "host" => Ok(Endianness::Native),
            _ => UnknownName {
                what: "endianness",
                value: s,
            }
            .fail(),
        }
    }
}

/// Depth and byte order of signed integer samples.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SampleFormat {
    pub depth: SampleDepth,
    pub endianness: Endianness,
}

impl Default for SampleFormat {
    fn default() -> Self {
        Self {
            depth: SampleDepth::Bits16,
            endianness: Endianness::Little,
        }
    }
}

impl SampleFormat {
    /// Convert a value in [-1, 1] into a signed integer sample.
    /// Values outside of that range are clamped to the representable extremes.
    ///
    /// # Examples
    ///
    /// ```
    /// use entune::config::*;
    ///
    /// let format = SampleFormat::default();
    /// assert_eq!(format.quantize(1.0), i16::MAX as i64);
    /// assert_eq!(format.quantize(-1.0), i16::MIN as i64);
    /// assert_eq!(format.quantize(0.0), 0);
    /// assert_eq!(format.quantize(7.5), i16::MAX as i64);
    /// ```
    pub fn quantize(&self, value: f64) -> i64 {
        let value = value.max(-1.0).min(1.0);
        let cardinality = (1u64 << self.depth.bits()) as f64;
        let scaled = (value + 1.0) / 2.0 * (cardinality - 1.0) - cardinality / 2.0;
        (scaled + 0.5).floor() as i64
    }

    /// Append a quantized sample to the buffer in the configured byte order.
    ///
    /// ```
    /// use entune::config::*;
    ///
    /// let format = SampleFormat { depth: SampleDepth::Bits24, endianness: Endianness::Big };
    /// let mut bytes = Vec::new();
    /// format.pack(-2, &mut bytes);
    /// assert_eq!(bytes, vec![0xff, 0xff, 0xfe]);
    /// ```
    pub fn pack(&self, sample: i64, out: &mut Vec<u8>) {
        let width = self.depth.bytes();
        let le = sample.to_le_bytes();
        let little = match self.endianness {
            Endianness::Little => true,
            Endianness::Big => false,
            Endianness::Native => cfg!(target_endian = "little"),
        };
        if little {
            out.extend_from_slice(&le[..width]);
        } else {
            out.extend(le[..width].iter().rev());
        }
    }

    /// The packed bytes of a silent sample.
    pub fn silence(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.depth.bytes());
        self.pack(self.quantize(0.0), &mut bytes);
        bytes
    }
}

/// Frequency of A4 that a tuning is anchored to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PitchStandard {
    A440,
    A415,
}

impl PitchStandard {
    pub fn frequency(self) -> f64 {
        match self {
            PitchStandard::A440 => 440.0,
            PitchStandard::A415 => 415.0,
        }
    }
}

impl FromStr for PitchStandard {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches(|c| c == 'A' || c == 'a') {
            "440" => Ok(PitchStandard::A440),
            "415" => Ok(PitchStandard::A415),
            _ => UnknownName {
                what: "pitch standard",
                value: s,
            }
            .fail(),
        }
    }
}

/// Everything that determines how a MIDI file is rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Number of samples per second and side.
    pub sample_rate: u32,
    pub format: SampleFormat,
    pub temperament: Temperament,
    /// Overrides the default pitch standard of the temperament.
    pub pitch_standard: Option<PitchStandard>,
    /// Steps per octave of the equal division indexing the harmonic table.
    pub notes_per_octave: u32,
    /// Depth of the harmonic series considered by the tuning search, in octaves.
    pub max_octaves: u32,
    /// Number of complete paths after which the tuning search gives up.
    pub max_search_paths: usize,
    /// Number of chords whose tuning is remembered.
    pub cache_size: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            format: SampleFormat::default(),
            temperament: Temperament::Dynamic,
            pitch_standard: None,
            notes_per_octave: 12,
            max_octaves: 4,
            max_search_paths: 30000,
            cache_size: 4096,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        snafu::ensure!(self.sample_rate > 0, ZeroSampleRate);
        snafu::ensure!(self.notes_per_octave > 0, ZeroNotesPerOctave);
        if self.temperament != Temperament::Dynamic {
            snafu::ensure!(
                self.notes_per_octave == 12,
                FixedTemperamentOctave {
                    notes_per_octave: self.notes_per_octave
                }
            );
        }
        Ok(())
    }

    /// The pitch standard in effect, taking the temperament's default into account.
    pub fn pitch_standard(&self) -> PitchStandard {
        self.pitch_standard
            .unwrap_or_else(|| self.temperament.default_pitch_standard())
    }

    pub fn nyquist(&self) -> f64 {
        f64::from(self.sample_rate) / 2.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_quantize_extremes() {
        for depth in &[
            SampleDepth::Bits8,
            SampleDepth::Bits16,
            SampleDepth::Bits24,
            SampleDepth::Bits32,
        ] {
            let format = SampleFormat {
                depth: *depth,
                endianness: Endianness::Little,
            };
            let half = 1i64 << (depth.bits() - 1);
            assert_eq!(format.quantize(1.0), half - 1);
            assert_eq!(format.quantize(-1.0), -half);
            assert_eq!(format.quantize(0.0), 0);
        }
    }

    #[test]
    fn test_pack_little_endian() {
        let format = SampleFormat::default();
        let mut bytes = Vec::new();
        format.pack(format.quantize(1.0), &mut bytes);
        format.pack(format.quantize(-1.0), &mut bytes);
        assert_eq!(bytes, vec![0xff, 0x7f, 0x00, 0x80]);
        assert_eq!(format.silence(), vec![0, 0]);
    }

    #[test]
    fn test_validate() {
        assert_eq!(RenderConfig::default().validate(), Ok(()));
        let config = RenderConfig {
            temperament: Temperament::Well,
            notes_per_octave: 19,
            ..RenderConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::FixedTemperamentOctave {
                notes_per_octave: 19
            })
        );
        assert_eq!(config.pitch_standard(), PitchStandard::A415);
        assert_eq!(SampleDepth::from_bits(12), Err(ConfigError::UnsupportedDepth { bits: 12 }));
    }
}
