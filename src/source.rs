//! Frame sources - decoded PCM for file channels
//!
//! Decoding sits behind [`FrameSourceProvider`]; the default provider reads
//! WAV through `hound`.

use crate::error::FrameSourceError;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Format of an opened source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceFormat {
    pub sample_rate: f64,
    pub frame_count: u64,
    pub channels: u16,
}

/// Fully decoded, planar f32 frames
#[derive(Debug, Clone)]
pub struct DecodedFrames {
    sample_rate: f64,
    channels: Vec<Vec<f32>>,
}

impl DecodedFrames {
    pub fn new(sample_rate: f64, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Split interleaved samples into planes
    pub fn from_interleaved(sample_rate: f64, channel_count: usize, interleaved: &[f32]) -> Self {
        let channel_count = channel_count.max(1);
        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (plane, &sample) in channels.iter_mut().zip(frame) {
                plane.push(sample);
            }
        }
        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Plane for an output port; ports past the last plane reuse it (mono -> stereo)
    pub fn channel(&self, index: usize) -> &[f32] {
        match self.channels.len() {
            0 => &[],
            n => &self.channels[index.min(n - 1)],
        }
    }
}

pub trait FrameSource: Send {
    fn format(&self) -> SourceFormat;

    /// Decode the whole source
    fn read(&mut self) -> Result<DecodedFrames, FrameSourceError>;
}

pub trait FrameSourceProvider: Send + Sync {
    fn open(&self, path: &str) -> Result<Box<dyn FrameSource>, FrameSourceError>;
}

/// Strip a `file://` scheme the host may pass through
pub fn normalize_path(path: &str) -> PathBuf {
    let trimmed = path.strip_prefix("file://").unwrap_or(path);
    PathBuf::from(trimmed)
}

/// WAV decoder (int 8/16/24/32, float 32)
#[derive(Debug, Default, Clone, Copy)]
pub struct WavFrameSourceProvider;

impl FrameSourceProvider for WavFrameSourceProvider {
    fn open(&self, path: &str) -> Result<Box<dyn FrameSource>, FrameSourceError> {
        let path = normalize_path(path);
        if !path.is_file() {
            return Err(FrameSourceError::NotFound(path.display().to_string()));
        }
        Ok(Box::new(WavFrameSource::open(&path)?))
    }
}

struct WavFrameSource {
    path: String,
    reader: hound::WavReader<BufReader<File>>,
}

impl WavFrameSource {
    fn open(path: &Path) -> Result<Self, FrameSourceError> {
        let display = path.display().to_string();
        let reader = hound::WavReader::open(path).map_err(|e| FrameSourceError::Decode {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: display,
            reader,
        })
    }

    fn decode_error(&self, err: hound::Error) -> FrameSourceError {
        FrameSourceError::Decode {
            path: self.path.clone(),
            reason: err.to_string(),
        }
    }
}

impl FrameSource for WavFrameSource {
    fn format(&self) -> SourceFormat {
        let spec = self.reader.spec();
        SourceFormat {
            sample_rate: spec.sample_rate as f64,
            frame_count: self.reader.duration() as u64,
            channels: spec.channels,
        }
    }

    fn read(&mut self) -> Result<DecodedFrames, FrameSourceError> {
        let spec = self.reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => {
                if spec.bits_per_sample != 32 {
                    return Err(FrameSourceError::Unsupported(format!(
                        "{}-bit float",
                        spec.bits_per_sample
                    )));
                }
                self.reader
                    .samples::<f32>()
                    .collect::<Result<_, _>>()
                    .map_err(|e| self.decode_error(e))?
            }
            hound::SampleFormat::Int => {
                let bits = spec.bits_per_sample;
                if bits == 0 || bits > 32 {
                    return Err(FrameSourceError::Unsupported(format!("{}-bit int", bits)));
                }
                let scale = 1.0 / (1_i64 << (bits - 1)) as f32;
                self.reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| self.decode_error(e))?
            }
        };

        Ok(DecodedFrames::from_interleaved(
            spec.sample_rate as f64,
            spec.channels as usize,
            &interleaved,
        ))
    }
}
