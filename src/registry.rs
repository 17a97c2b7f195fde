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
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::engine::{BankData, Engine, EngineLoader, OutputLayout};
use crate::error::{LoadError, SynthError};

/// The voice cap used when a load does not ask for one.
pub const DEFAULT_MAX_VOICES: usize = 256;

/// A render holds its snapshot for one callback, so a release first yields a few
/// times and then sleeps between checks.
const RELEASE_YIELD_SPINS: u32 = 64;
const RELEASE_BACKOFF: Duration = Duration::from_micros(200);

/// Opaque identifier of a loaded sample bank. Ids increase with every load and are
/// never reused by the synth that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sfid(u32);

impl Sfid {
    /// The raw id.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Sfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An engine shared between the controller and the audio thread.
pub(crate) type SharedEngine = Arc<Mutex<Box<dyn Engine>>>;

/// One entry of a published snapshot.
#[derive(Clone)]
pub(crate) struct LoadedEngine {
    pub(crate) id: Sfid,
    pub(crate) engine: SharedEngine,
}

/// The loaded engines in load order, as seen by the audio thread.
pub(crate) type EngineSnapshot = Arc<[LoadedEngine]>;

/// The published engine set. Cloning it shares the same set.
#[derive(Clone)]
pub(crate) struct EngineSet {
    current: Arc<RwLock<EngineSnapshot>>,
}

impl EngineSet {
    fn new() -> EngineSet {
        let empty: Vec<LoadedEngine> = Vec::new();
        EngineSet {
            current: Arc::new(RwLock::new(empty.into())),
        }
    }

    /// Returns the current snapshot. The lock is held only to clone the `Arc`.
    pub(crate) fn snapshot(&self) -> EngineSnapshot {
        Arc::clone(&self.current.read())
    }

    fn publish(&self, snapshot: EngineSnapshot) {
        *self.current.write() = snapshot;
    }
}

/// Settings applied to an engine when it is loaded.
pub(crate) struct EngineSetup {
    pub(crate) sample_rate: u32,
    pub(crate) gain_db: f32,
    pub(crate) max_voices: usize,
}

/// Owns every loaded engine and allocates their ids. Every change publishes a fresh
/// snapshot for the audio thread, so a render never sees a set being modified.
pub struct Registry {
    /// Builds engines from bank data.
    loader: Box<dyn EngineLoader>,
    /// Live engines by id. Iteration order is load order since ids only increase.
    engines: BTreeMap<Sfid, SharedEngine>,
    /// The snapshot shared with the mixer.
    published: EngineSet,
    /// Next id to hand out. Never rewound.
    next_sfid: u32,
}

impl Registry {
    /// Creates an empty registry using the given loader.
    pub fn new(loader: Box<dyn EngineLoader>) -> Registry {
        Registry {
            loader,
            engines: BTreeMap::new(),
            published: EngineSet::new(),
            next_sfid: 0,
        }
    }

    /// Builds, configures and registers an engine. Nothing changes if any step fails.
    pub(crate) fn load(&mut self, data: &BankData, setup: &EngineSetup) -> Result<Sfid, LoadError> {
        let mut engine = self.loader.load(data)?;
        engine.configure_output(
            OutputLayout::StereoInterleaved,
            setup.sample_rate,
            setup.gain_db,
        )?;
        engine.set_voice_cap(setup.max_voices)?;

        let sfid = Sfid(self.next_sfid);
        self.next_sfid += 1;
        self.engines.insert(sfid, Arc::new(Mutex::new(engine)));
        self.publish();

        info!(
            sfid = %sfid,
            bank = %data,
            gain_db = setup.gain_db,
            max_voices = setup.max_voices,
            "Loaded SoundFont"
        );
        Ok(sfid)
    }

    /// Removes an engine and releases it.
    pub(crate) fn unload(&mut self, sfid: Sfid) -> Result<(), SynthError> {
        let engine = self.engines.remove(&sfid).ok_or(SynthError::InvalidId(sfid))?;
        self.publish();
        Self::release(engine);
        info!(sfid = %sfid, "Unloaded SoundFont");
        Ok(())
    }

    /// Drops the last reference to an unloaded engine on this thread. A render that
    /// took its snapshot before the unload may still hold the engine; wait for it so
    /// that the engine is never freed on the audio thread.
    fn release(engine: SharedEngine) {
        let mut spins = 0u32;
        while Arc::strong_count(&engine) > 1 {
            if spins < RELEASE_YIELD_SPINS {
                thread::yield_now();
            } else {
                spin_sleep::sleep(RELEASE_BACKOFF);
            }
            spins = spins.saturating_add(1);
        }
        if spins > 0 {
            debug!(spins, "Waited for in-flight render before releasing engine");
        }
    }

    /// Returns the engine registered under the id.
    pub(crate) fn get(&self, sfid: Sfid) -> Result<&SharedEngine, SynthError> {
        self.engines.get(&sfid).ok_or(SynthError::InvalidId(sfid))
    }

    /// Returns true if the id is currently registered.
    pub fn contains(&self, sfid: Sfid) -> bool {
        self.engines.contains_key(&sfid)
    }

    /// The registered ids in load order.
    pub fn ids(&self) -> Vec<Sfid> {
        self.engines.keys().copied().collect()
    }

    /// Number of loaded engines.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// A handle to the published engine set for the mixer.
    pub(crate) fn engine_set(&self) -> EngineSet {
        self.published.clone()
    }

    /// Every loaded engine, for operations that address all of them.
    pub(crate) fn engines(&self) -> impl Iterator<Item = &SharedEngine> {
        self.engines.values()
    }

    fn publish(&self) {
        let snapshot: Vec<LoadedEngine> = self
            .engines
            .iter()
            .map(|(id, engine)| LoadedEngine {
                id: *id,
                engine: Arc::clone(engine),
            })
            .collect();
        self.published.publish(snapshot.into());
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("engines", &self.ids())
            .field("next_sfid", &self.next_sfid)
            .finish()
    }
}
