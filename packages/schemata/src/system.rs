//! Named, per-frame system callbacks.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::time::{Duration, Instant};

use crate::world::World;

/// The callback run when a system is invoked.
///
/// It receives the world and the frame's delta time.
pub type SystemFn = Box<dyn FnMut(&mut World, f32) + 'static>;

/// A monotonic time source used to time systems.
pub trait Clock {
    /// Time elapsed since some fixed, arbitrary point.
    fn now(&self) -> Duration;
}

/// A `Clock` backed by `std::time::Instant`.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> MonotonicClock {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        MonotonicClock::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

struct SystemEntry {
    name: String,
    // Taken while the system is running.
    callback: Option<SystemFn>,
    enabled: bool,
    last_duration: Duration,
}

/// A read-only view of a registered system.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemInfo<'a> {
    pub name: &'a str,
    pub enabled: bool,
    pub last_duration: Duration,
}

/// The set of systems registered with a `World`, kept in name order.
#[derive(Default)]
pub struct SystemRegistry {
    entries: Vec<SystemEntry>,
    by_name: HashMap<String, usize>,
}

impl SystemRegistry {
    pub fn new() -> SystemRegistry {
        SystemRegistry::default()
    }

    /// The number of registered systems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no systems are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if a system with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Add a new, enabled system.
    ///
    /// # Panics
    /// If a system with the same name is already registered.
    pub fn register(&mut self, name: impl Into<String>, callback: SystemFn) {
        let name = name.into();
        assert!(!self.contains(&name), "system {:?} is already registered", name);

        let insert_idx = self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name.as_str()))
            .unwrap_or_else(|idx| idx);
        self.entries.insert(insert_idx, SystemEntry {
            name,
            callback: Some(callback),
            enabled: true,
            last_duration: Duration::default(),
        });
        self.reindex();
    }

    /// Enable or disable a system.
    ///
    /// # Panics
    /// If no system has the given name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        self.entry_mut(name).enabled = enabled;
    }

    /// Returns true if the named system is enabled.
    ///
    /// # Panics
    /// If no system has the given name.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.entry(name).enabled
    }

    /// Iterate over every system in name order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item=SystemInfo<'a>> + 'a {
        self.entries.iter().map(|e| SystemInfo {
            name: &e.name,
            enabled: e.enabled,
            last_duration: e.last_duration,
        })
    }

    /// Take the callback of an enabled system so that it can be run.
    ///
    /// Returns `None` if the system is disabled.
    ///
    /// # Panics
    /// If no system has the given name, or it is already running.
    pub(crate) fn begin(&mut self, name: &str) -> Option<SystemFn> {
        let entry = self.entry_mut(name);
        if !entry.enabled {
            return None;
        }

        match entry.callback.take() {
            Some(callback) => Some(callback),
            None => panic!("system {:?} invoked while already running", name),
        }
    }

    /// Return a callback taken by `begin` and record how long it ran.
    pub(crate) fn finish(&mut self, name: &str, callback: SystemFn, duration: Duration) {
        let entry = self.entry_mut(name);
        entry.callback = Some(callback);
        entry.last_duration = duration;
    }

    fn entry(&self, name: &str) -> &SystemEntry {
        match self.by_name.get(name) {
            Some(idx) => &self.entries[*idx],
            None => panic!("no system named {:?}", name),
        }
    }

    fn entry_mut(&mut self, name: &str) -> &mut SystemEntry {
        match self.by_name.get(name) {
            Some(idx) => &mut self.entries[*idx],
            None => panic!("no system named {:?}", name),
        }
    }

    fn reindex(&mut self) {
        self.by_name = self.entries.iter()
            .enumerate()
            .map(|(idx, e)| (e.name.clone(), idx))
            .collect();
    }
}

impl Debug for SystemRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
