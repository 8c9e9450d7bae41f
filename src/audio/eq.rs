//! Three-band channel equalizer
//!
//! `EqStage` is the control-side handle: settings live in an `ArcSwap` and a
//! generation counter tells the render-side `EqNode` when to recompute its
//! biquad coefficients. Updates never touch the node's buffers.

use super::buffer::AudioBuffer;
use super::node::{AudioNode, NodeType, PortBuffers, PortId};
use super::CHANNEL_PORTS;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frequency value meaning "leave the band's frequency as it is"
pub const FREQUENCY_UNSPECIFIED: f32 = -1.0;

pub const DEFAULT_BASS_FREQUENCY: f32 = 115.0;
pub const DEFAULT_MID_FREQUENCY: f32 = 500.0;
pub const DEFAULT_TREBLE_FREQUENCY: f32 = 1500.0;

/// Gain/frequency for the three fixed-role bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqSettings {
    pub bass_gain: f32,
    pub bass_frequency: f32,
    pub mid_gain: f32,
    pub mid_frequency: f32,
    pub treble_gain: f32,
    pub treble_frequency: f32,
}

impl Default for EqSettings {
    fn default() -> Self {
        Self {
            bass_gain: 0.0,
            bass_frequency: DEFAULT_BASS_FREQUENCY,
            mid_gain: 0.0,
            mid_frequency: DEFAULT_MID_FREQUENCY,
            treble_gain: 0.0,
            treble_frequency: DEFAULT_TREBLE_FREQUENCY,
        }
    }
}

impl EqSettings {
    pub fn band(&self, band: EqBand) -> (f32, f32) {
        match band {
            EqBand::Bass => (self.bass_gain, self.bass_frequency),
            EqBand::Mid => (self.mid_gain, self.mid_frequency),
            EqBand::Treble => (self.treble_gain, self.treble_frequency),
        }
    }

    /// Copy with one band changed; the sentinel frequency keeps the old one
    pub fn with_band(mut self, band: EqBand, gain: f32, frequency: f32) -> Self {
        let (g, f) = match band {
            EqBand::Bass => (&mut self.bass_gain, &mut self.bass_frequency),
            EqBand::Mid => (&mut self.mid_gain, &mut self.mid_frequency),
            EqBand::Treble => (&mut self.treble_gain, &mut self.treble_frequency),
        };
        *g = gain;
        if frequency != FREQUENCY_UNSPECIFIED {
            *f = frequency;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqBand {
    Bass,
    Mid,
    Treble,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Bass, EqBand::Mid, EqBand::Treble];

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bass" => Some(EqBand::Bass),
            "mid" => Some(EqBand::Mid),
            "treble" => Some(EqBand::Treble),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EqBand::Bass => "bass",
            EqBand::Mid => "mid",
            EqBand::Treble => "treble",
        }
    }
}

/// Shared, lock-free EQ parameters for one channel
pub struct EqStage {
    settings: ArcSwap<EqSettings>,
    generation: AtomicU64,
    /// Mid band bandwidth in octaves
    mid_bandwidth: f32,
}

impl EqStage {
    pub fn new(settings: EqSettings, mid_bandwidth: f32) -> Self {
        Self {
            settings: ArcSwap::from_pointee(settings),
            generation: AtomicU64::new(1),
            mid_bandwidth,
        }
    }

    /// Update one band; `FREQUENCY_UNSPECIFIED` only applies the gain
    pub fn adjust_band(&self, band: EqBand, gain: f32, frequency: f32) -> EqSettings {
        self.settings
            .rcu(|current| current.with_band(band, gain, frequency));
        self.generation.fetch_add(1, Ordering::Release);
        self.current_settings()
    }

    /// Name-based variant. Unknown names are logged and ignored.
    pub fn adjust_named(&self, name: &str, gain: f32, frequency: f32) -> bool {
        match EqBand::parse(name) {
            Some(band) => {
                self.adjust_band(band, gain, frequency);
                true
            }
            None => {
                log::warn!("[EqStage] Unknown band '{}', ignoring", name);
                false
            }
        }
    }

    pub fn current_settings(&self) -> EqSettings {
        **self.settings.load()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn mid_bandwidth(&self) -> f32 {
        self.mid_bandwidth
    }
}

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn omega(sample_rate: f32, frequency: f32) -> (f32, f32) {
        let frequency = frequency.max(10.0).min(sample_rate * 0.45);
        let omega = 2.0 * PI * frequency / sample_rate;
        (omega.sin(), omega.cos())
    }

    fn low_shelf(sample_rate: f32, frequency: f32, gain_db: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        // shelf slope S = 1
        let beta = 2.0 * a.sqrt() * (sin_w / 2.0 * 2.0_f32.sqrt());

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * cos_w + beta),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w),
            a * ((a + 1.0) - (a - 1.0) * cos_w - beta),
            (a + 1.0) + (a - 1.0) * cos_w + beta,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_w),
            (a + 1.0) + (a - 1.0) * cos_w - beta,
        )
    }

    fn high_shelf(sample_rate: f32, frequency: f32, gain_db: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let (sin_w, cos_w) = Self::omega(sample_rate, frequency);
        let beta = 2.0 * a.sqrt() * (sin_w / 2.0 * 2.0_f32.sqrt());

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * cos_w + beta),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w),
            a * ((a + 1.0) + (a - 1.0) * cos_w - beta),
            (a + 1.0) - (a - 1.0) * cos_w + beta,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_w),
            (a + 1.0) - (a - 1.0) * cos_w - beta,
        )
    }

    /// Peaking filter with bandwidth in octaves
    fn peaking(sample_rate: f32, frequency: f32, gain_db: f32, bandwidth: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let frequency = frequency.max(10.0).min(sample_rate * 0.45);
        let omega = 2.0 * PI * frequency / sample_rate;
        let (sin_w, cos_w) = (omega.sin(), omega.cos());
        let alpha = sin_w * ((2.0_f32.ln() / 2.0) * bandwidth * omega / sin_w).sinh();

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_w,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w,
            1.0 - alpha / a,
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Biquad {
    coeffs: Coefficients,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn new() -> Self {
        Self {
            coeffs: Coefficients::IDENTITY,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let mut y = c.b0 * x + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;
        // denormal flush
        if y.abs() < 1e-15 {
            y = 0.0;
        }
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Render-side EQ node: low shelf, peaking, high shelf in series per port
pub struct EqNode {
    label: String,
    stage: Arc<EqStage>,
    sample_rate: f32,
    seen_generation: u64,
    /// `[port][band]`
    filters: [[Biquad; 3]; CHANNEL_PORTS],
    ports: PortBuffers,
}

impl EqNode {
    pub fn new(label: impl Into<String>, stage: Arc<EqStage>, sample_rate: f64) -> Self {
        let mut node = Self {
            label: label.into(),
            stage,
            sample_rate: sample_rate as f32,
            seen_generation: 0,
            filters: [[Biquad::new(); 3]; CHANNEL_PORTS],
            ports: PortBuffers::new(CHANNEL_PORTS, CHANNEL_PORTS),
        };
        node.refresh_coefficients();
        node
    }

    fn refresh_coefficients(&mut self) {
        let generation = self.stage.generation();
        if generation == self.seen_generation {
            return;
        }
        let settings = self.stage.current_settings();
        let sr = self.sample_rate;
        let bands = [
            Coefficients::low_shelf(sr, settings.bass_frequency, settings.bass_gain),
            Coefficients::peaking(
                sr,
                settings.mid_frequency,
                settings.mid_gain,
                self.stage.mid_bandwidth(),
            ),
            Coefficients::high_shelf(sr, settings.treble_frequency, settings.treble_gain),
        ];
        for port in self.filters.iter_mut() {
            for (filter, coeffs) in port.iter_mut().zip(bands) {
                filter.coeffs = coeffs;
            }
        }
        self.seen_generation = generation;
    }
}

impl AudioNode for EqNode {
    fn node_type(&self) -> NodeType {
        NodeType::Effect
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn input_port_count(&self) -> usize {
        self.ports.input_count()
    }

    fn output_port_count(&self) -> usize {
        self.ports.output_count()
    }

    fn input_buffer_mut(&mut self, port: PortId) -> Option<&mut AudioBuffer> {
        self.ports.input_mut(port.index())
    }

    fn output_buffer(&self, port: PortId) -> Option<&AudioBuffer> {
        self.ports.output(port.index())
    }

    fn process(&mut self, frames: usize) {
        self.refresh_coefficients();
        for (port, chain) in self.filters.iter_mut().enumerate() {
            let Some((input, output)) = self.ports.pair_mut(port) else {
                continue;
            };
            let frames = frames.min(input.valid_frames());
            output.set_valid_frames(frames);
            let out = output.samples_mut();
            for (o, &x) in out.iter_mut().zip(input.samples()) {
                let mut y = x;
                for filter in chain.iter_mut() {
                    y = filter.process(y);
                }
                *o = y;
            }
        }
    }

    fn clear_buffers(&mut self, frames: usize) {
        self.ports.clear(frames);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
