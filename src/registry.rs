//! Channel registry - the single owner of every live channel
//!
//! Ids are unique across file and mic channels. Removal always goes through
//! the channel's `destroy()` first.

use crate::channel::{
    Channel, ChannelContext, ChannelKind, ChannelSettings, DestroySummary, FileChannel, MicChannel,
};
use crate::error::{MixerError, MixerResult};
use std::collections::HashMap;

#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Channel>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_available(&self, id: &str) -> MixerResult<()> {
        if self.channels.contains_key(id) {
            return Err(MixerError::AlreadyExists("audioId already in use".to_string()));
        }
        Ok(())
    }

    /// Build and register a channel of `kind`. `file_path` is only read for
    /// file channels.
    pub fn create(
        &mut self,
        id: &str,
        kind: ChannelKind,
        file_path: &str,
        settings: &ChannelSettings,
        ctx: &ChannelContext,
    ) -> MixerResult<()> {
        self.ensure_available(id)?;
        let channel = match kind {
            ChannelKind::File => Channel::File(FileChannel::setup(id, file_path, settings, ctx)?),
            ChannelKind::Mic => Channel::Mic(MicChannel::setup(id, settings, ctx)?),
        };
        self.channels.insert(id.to_string(), channel);
        log::debug!("[Registry] Registered {} channel {} ({} live)", kind.as_str(), id, self.channels.len());
        Ok(())
    }

    /// Tear down and forget a channel
    pub fn destroy(&mut self, id: &str) -> MixerResult<DestroySummary> {
        let channel = self
            .channels
            .get_mut(id)
            .ok_or_else(|| MixerError::NotFound(format!("no channel with id {}", id)))?;
        let summary = channel.control_mut().destroy();
        self.channels.remove(id);
        Ok(summary)
    }

    pub fn get(&self, id: &str) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    pub fn kind_of(&self, id: &str) -> Option<ChannelKind> {
        self.channels.get(id).map(Channel::kind)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Ids of one kind, sorted for deterministic iteration
    pub fn ids(&self, kind: ChannelKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .channels
            .iter()
            .filter(|(_, c)| c.kind() == kind)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn file_channels(&self) -> impl Iterator<Item = (&String, &FileChannel)> {
        self.channels
            .iter()
            .filter_map(|(id, c)| c.as_file().map(|f| (id, f)))
    }

    pub fn mic_channels_mut(&mut self) -> impl Iterator<Item = (&String, &mut MicChannel)> {
        self.channels
            .iter_mut()
            .filter_map(|(id, c)| c.as_mic_mut().map(|m| (id, m)))
    }

    /// Destroy everything
    pub fn reset_all(&mut self) -> Vec<DestroySummary> {
        let summaries = self
            .channels
            .values_mut()
            .map(|c| c.control_mut().destroy())
            .collect();
        self.channels.clear();
        summaries
    }
}
