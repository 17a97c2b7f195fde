// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::SynthError;
use crate::registry::Sfid;

/// Presets selected on this channel are drum kits: every key may play a different
/// sample instead of one instrument across the key range.
pub const DRUM_CHANNEL: u8 = 10;

/// Returns true for the drum channel.
pub fn is_drum_channel(channel: u8) -> bool {
    channel == DRUM_CHANNEL
}

/// Maps channels to the engine that plays them. A channel has at most one engine.
#[derive(Debug, Default)]
pub struct Router {
    channels: BTreeMap<u8, Sfid>,
}

impl Router {
    /// Creates a router with no channels assigned.
    pub fn new() -> Router {
        Router::default()
    }

    /// Routes the channel to the engine, returning the engine it was routed to before.
    pub fn assign(&mut self, channel: u8, sfid: Sfid) -> Option<Sfid> {
        self.channels.insert(channel, sfid)
    }

    /// Removes the channel's route.
    pub fn unassign(&mut self, channel: u8) -> Result<Sfid, SynthError> {
        self.channels
            .remove(&channel)
            .ok_or(SynthError::ChannelUnassigned(channel))
    }

    /// The engine the channel is routed to, if any.
    pub fn get(&self, channel: u8) -> Option<Sfid> {
        self.channels.get(&channel).copied()
    }

    /// The engine the channel is routed to, or `ChannelUnassigned`.
    pub fn sfid(&self, channel: u8) -> Result<Sfid, SynthError> {
        self.get(channel)
            .ok_or(SynthError::ChannelUnassigned(channel))
    }

    /// Unassigns every channel routed to the engine and returns those channels.
    pub fn remove_sfid(&mut self, sfid: Sfid) -> Vec<u8> {
        let cleared: Vec<u8> = self
            .channels
            .iter()
            .filter(|(_, routed)| **routed == sfid)
            .map(|(channel, _)| *channel)
            .collect();
        self.channels.retain(|_, routed| *routed != sfid);
        if !cleared.is_empty() {
            debug!(sfid = %sfid, channels = ?cleared, "Cleared channels of unloaded SoundFont");
        }
        cleared
    }

    /// Assigned channels and their engines, by channel.
    pub fn channels(&self) -> impl Iterator<Item = (u8, Sfid)> + '_ {
        self.channels.iter().map(|(channel, sfid)| (*channel, *sfid))
    }
}
