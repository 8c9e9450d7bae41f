//! Channels - one independently controlled source with EQ, gain and metering
//!
//! A channel owns its three graph nodes (through [`SignalPath`]) and its
//! background queues. The registry is the only owner; teardown is the
//! explicit [`ChannelControl::destroy`], never a drop side effect.

mod file;
mod mic;

pub use file::FileChannel;
pub use mic::{MicChannel, MicState};

use crate::audio::eq::{EqBand, EqNode, EqSettings, EqStage};
use crate::audio::gain::{GainControl, GainNode, TapSlot};
use crate::audio::meters::MeterTap;
use crate::audio::{AudioNode, ChannelHandles, ChannelNodes, MixGraph};
use crate::config::MixerConfig;
use crate::engine::Engine;
use crate::error::MixerResult;
use crate::events::EventBridge;
use crate::source::FrameSourceProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Caller parameters fixed at creation
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSettings {
    pub volume: f32,
    /// Meter event name, empty disables metering
    pub listener_name: String,
    /// File channels only
    pub elapsed_time_event_name: String,
    /// Mic channels only: which hardware input channel to capture
    pub channel_number: usize,
    pub eq_settings: EqSettings,
}

impl ChannelSettings {
    pub fn from_config(config: &MixerConfig) -> Self {
        Self {
            volume: config.default_volume,
            listener_name: String::new(),
            elapsed_time_event_name: String::new(),
            channel_number: 0,
            eq_settings: config.default_eq,
        }
    }
}

/// Event names a destroyed channel was using
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroySummary {
    pub listener_name: String,
    pub elapsed_time_event_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelKind {
    File,
    Mic,
}

impl ChannelKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(ChannelKind::File),
            "mic" => Some(ChannelKind::Mic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::File => "file",
            ChannelKind::Mic => "mic",
        }
    }
}

/// Shared collaborators handed to channel constructors
#[derive(Clone)]
pub struct ChannelContext {
    pub engine: Arc<Engine>,
    pub events: Arc<dyn EventBridge>,
    pub sources: Arc<dyn FrameSourceProvider>,
    pub config: Arc<MixerConfig>,
}

/// Operations both channel kinds support
pub trait ChannelControl {
    fn id(&self) -> &str;

    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;

    /// Returns the settings after the change
    fn adjust_eq(&self, band: EqBand, gain: f32, frequency: f32) -> EqSettings;

    fn current_eq(&self) -> EqSettings;

    /// Stop taps, detach nodes. No event for this channel is delivered
    /// after this returns.
    fn destroy(&mut self) -> DestroySummary;
}

pub enum Channel {
    File(FileChannel),
    Mic(MicChannel),
}

impl Channel {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::File(_) => ChannelKind::File,
            Channel::Mic(_) => ChannelKind::Mic,
        }
    }

    pub fn control(&self) -> &dyn ChannelControl {
        match self {
            Channel::File(c) => c,
            Channel::Mic(c) => c,
        }
    }

    pub fn control_mut(&mut self) -> &mut dyn ChannelControl {
        match self {
            Channel::File(c) => c,
            Channel::Mic(c) => c,
        }
    }

    pub fn as_file(&self) -> Option<&FileChannel> {
        match self {
            Channel::File(c) => Some(c),
            Channel::Mic(_) => None,
        }
    }

    pub fn as_mic_mut(&mut self) -> Option<&mut MicChannel> {
        match self {
            Channel::Mic(c) => Some(c),
            Channel::File(_) => None,
        }
    }
}

/// A channel's `player -> eq -> gain` nodes once attached to the mix graph
pub(crate) struct SignalPath {
    graph: Arc<MixGraph>,
    handles: Option<ChannelHandles>,
    eq: Arc<EqStage>,
    gain: Arc<GainControl>,
    tap: Arc<TapSlot>,
}

impl SignalPath {
    pub(crate) fn attach(
        graph: &Arc<MixGraph>,
        id: &str,
        player: Box<dyn AudioNode>,
        settings: &ChannelSettings,
        config: &MixerConfig,
    ) -> MixerResult<Self> {
        let eq = Arc::new(EqStage::new(settings.eq_settings, config.mid_bandwidth));
        let gain = Arc::new(GainControl::new(settings.volume));
        let gain_node = GainNode::new(format!("{}.gain", id), gain.clone());
        let tap = gain_node.tap_slot();

        let handles = graph.attach_channel(ChannelNodes {
            player,
            eq: Box::new(EqNode::new(format!("{}.eq", id), eq.clone(), graph.sample_rate())),
            gain: Box::new(gain_node),
        })?;

        Ok(Self {
            graph: graph.clone(),
            handles: Some(handles),
            eq,
            gain,
            tap,
        })
    }

    pub(crate) fn install_tap(&self, tap: MeterTap) {
        self.tap.store(Some(Arc::new(tap)));
    }

    pub(crate) fn remove_tap(&self) {
        self.tap.store(None);
    }

    pub(crate) fn has_tap(&self) -> bool {
        self.tap.load().is_some()
    }

    /// Idempotent
    pub(crate) fn detach(&mut self) -> bool {
        self.remove_tap();
        match self.handles.take() {
            Some(handles) => self.graph.detach_channel(handles),
            None => false,
        }
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.handles.is_some()
    }

    pub(crate) fn eq(&self) -> &EqStage {
        &self.eq
    }

    pub(crate) fn gain(&self) -> &GainControl {
        &self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings() {
        assert_eq!(ChannelKind::parse("file"), Some(ChannelKind::File));
        assert_eq!(ChannelKind::parse("mic"), Some(ChannelKind::Mic));
        assert_eq!(ChannelKind::parse("stream"), None);
        assert_eq!(ChannelKind::Mic.as_str(), "mic");
    }

    #[test]
    fn test_detach_is_idempotent() {
        use crate::audio::source::{FilePlayerNode, FileTransport};
        use crate::source::DecodedFrames;

        let graph = Arc::new(MixGraph::new(48000.0));
        let config = MixerConfig::default();
        let frames = Arc::new(DecodedFrames::new(48000.0, vec![vec![0.0; 16]]));
        let player = FilePlayerNode::new("p", frames, Arc::new(FileTransport::new(16, 48000.0)), 48000.0, 1.0);
        let mut path = SignalPath::attach(
            &graph,
            "a",
            Box::new(player),
            &ChannelSettings::from_config(&config),
            &config,
        )
        .unwrap();

        assert_eq!(graph.node_count(), 4);
        assert!(path.detach());
        assert!(!path.detach());
        assert!(!path.is_attached());
        assert_eq!(graph.node_count(), 1);
    }
}
