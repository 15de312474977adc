//! Registry of connected clients, indexed three ways under one lock.
//!
//! A channel is either present in every index or in none of them. Empty
//! per-app maps and empty timestamp buckets are pruned as soon as they
//! empty out, so the indices never accumulate tombstones.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::channel::{ChannelId, ClientChannel};
use crate::clock::Clock;


const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// What the registry knows about one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Tenant application.
    pub app: i32,
    /// Client-reported identity, unique within the app.
    pub address: String,
    /// Last registration or heartbeat, in epoch milliseconds.
    pub last_seen: u64,
}

/// Outcome of [`ClientRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The channel was not known before.
    Online,
    /// The channel was known; its timestamp moved forward.
    Refreshed,
}

/// A channel removed by [`ClientRegistry::reap`] or [`ClientRegistry::drain`].
#[derive(Debug, Clone)]
pub struct Reaped {
    /// Registry state at removal.
    pub info: ChannelInfo,
    /// Handle to the removed channel, for the caller to close.
    pub channel: Arc<dyn ClientChannel>,
}

#[derive(Debug)]
struct Entry {
    info: ChannelInfo,
    channel: Arc<dyn ClientChannel>,
}

#[derive(Debug, Default)]
struct Indices {
    app_addr: HashMap<i32, HashMap<String, ChannelId>>,
    chan_info: HashMap<ChannelId, Entry>,
    app_time: HashMap<i32, BTreeMap<u64, BTreeSet<ChannelId>>>,
}

impl Indices {
    fn insert(&mut self, channel: Arc<dyn ClientChannel>, info: ChannelInfo) {
        let id = channel.id();
        self.app_addr
            .entry(info.app)
            .or_default()
            .insert(info.address.clone(), id);
        self.app_time
            .entry(info.app)
            .or_default()
            .entry(info.last_seen)
            .or_default()
            .insert(id);
        self.chan_info.insert(id, Entry { info, channel });
    }

    fn remove(&mut self, id: ChannelId) -> Option<Entry> {
        let entry = self.chan_info.remove(&id)?;
        let ChannelInfo {
            app,
            ref address,
            last_seen,
        } = entry.info;
        if let Some(addresses) = self.app_addr.get_mut(&app) {
            if addresses.get(address) == Some(&id) {
                addresses.remove(address);
            }
            if addresses.is_empty() {
                self.app_addr.remove(&app);
            }
        }
        self.unlink_time(app, last_seen, id);
        Some(entry)
    }

    fn unlink_time(&mut self, app: i32, last_seen: u64, id: ChannelId) {
        let Some(buckets) = self.app_time.get_mut(&app) else {
            return;
        };
        if let Some(bucket) = buckets.get_mut(&last_seen) {
            bucket.remove(&id);
            if bucket.is_empty() {
                buckets.remove(&last_seen);
            }
        }
        if buckets.is_empty() {
            self.app_time.remove(&app);
        }
    }

    fn refresh(&mut self, id: ChannelId, now: u64) {
        let Some(entry) = self.chan_info.get_mut(&id) else {
            return;
        };
        let app = entry.info.app;
        let previous = entry.info.last_seen;
        entry.info.last_seen = now;
        self.unlink_time(app, previous, id);
        self.app_time
            .entry(app)
            .or_default()
            .entry(now)
            .or_default()
            .insert(id);
    }
}

/// Thread-safe client registry.
pub struct ClientRegistry {
    indices: Mutex<Indices>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientRegistry")
            .field("channels", &self.len())
            .finish_non_exhaustive()
    }
}

impl ClientRegistry {
    /// Creates an empty registry reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            indices: Mutex::new(Indices::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Indices> {
        self.indices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `channel` for `(app, address)`, or refreshes its timestamp
    /// when it is already known.
    ///
    /// A refresh keeps the app and address recorded at first registration.
    /// When a different channel already owns `(app, address)`, that channel
    /// is unregistered first; closing it is left to its reader.
    pub fn register(
        &self,
        app: i32,
        channel: &Arc<dyn ClientChannel>,
        address: &str,
    ) -> Registration {
        let id = channel.id();
        let now = self.clock.now_millis();
        let displaced = {
            let mut indices = self.lock();
            if indices.chan_info.contains_key(&id) {
                indices.refresh(id, now);
                return Registration::Refreshed;
            }
            let owner = indices
                .app_addr
                .get(&app)
                .and_then(|addresses| addresses.get(address))
                .copied();
            let displaced = owner.and_then(|previous| indices.remove(previous));
            indices.insert(
                Arc::clone(channel),
                ChannelInfo {
                    app,
                    address: address.to_owned(),
                    last_seen: now,
                },
            );
            displaced
        };

        if let Some(previous) = displaced {
            info!(
                target: REGISTRY_TARGET,
                app,
                address,
                channel = %previous.channel.id(),
                "client replaced"
            );
        }
        info!(
            target: REGISTRY_TARGET,
            app,
            address,
            channel = %id,
            peer = channel.peer(),
            "client online"
        );
        Registration::Online
    }

    /// Removes `id` from every index. Unknown ids are ignored.
    pub fn unregister(&self, id: ChannelId) -> Option<ChannelInfo> {
        let removed = self.lock().remove(id)?;
        info!(
            target: REGISTRY_TARGET,
            app = removed.info.app,
            address = %removed.info.address,
            channel = %id,
            "client offline"
        );
        Some(removed.info)
    }

    /// Removes every channel whose `last_seen` is strictly before `cutoff`.
    ///
    /// The returned channels are no longer registered; closing them is the
    /// caller's job and happens outside the registry lock.
    pub fn reap(&self, cutoff: u64) -> Vec<Reaped> {
        let reaped: Vec<Reaped> = {
            let mut indices = self.lock();
            let stale: Vec<ChannelId> = indices
                .app_time
                .values()
                .flat_map(|buckets| buckets.range(..cutoff))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect();
            stale
                .into_iter()
                .filter_map(|id| indices.remove(id))
                .map(|entry| Reaped {
                    info: entry.info,
                    channel: entry.channel,
                })
                .collect()
        };
        for entry in &reaped {
            info!(
                target: REGISTRY_TARGET,
                app = entry.info.app,
                address = %entry.info.address,
                channel = %entry.channel.id(),
                last_seen = entry.info.last_seen,
                "client offline (expired)"
            );
        }
        reaped
    }

    /// Removes every registration, returning the channels that were held.
    pub fn drain(&self) -> Vec<Reaped> {
        let drained: Vec<Reaped> = {
            let mut indices = self.lock();
            let ids: Vec<ChannelId> = indices.chan_info.keys().copied().collect();
            ids.into_iter()
                .filter_map(|id| indices.remove(id))
                .map(|entry| Reaped {
                    info: entry.info,
                    channel: entry.channel,
                })
                .collect()
        };
        for entry in &drained {
            info!(
                target: REGISTRY_TARGET,
                app = entry.info.app,
                address = %entry.info.address,
                channel = %entry.channel.id(),
                "client offline (server stopping)"
            );
        }
        drained
    }

    /// Snapshot of the addresses registered for `app`.
    pub fn list_addresses(&self, app: i32) -> BTreeSet<String> {
        self.lock()
            .app_addr
            .get(&app)
            .map(|addresses| addresses.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Handles of every channel registered for `app`.
    pub fn channels(&self, app: i32) -> Vec<Arc<dyn ClientChannel>> {
        let indices = self.lock();
        let Some(addresses) = indices.app_addr.get(&app) else {
            return Vec::new();
        };
        addresses
            .values()
            .filter_map(|id| indices.chan_info.get(id))
            .map(|entry| Arc::clone(&entry.channel))
            .collect()
    }

    /// Chooses a channel for `app`.
    ///
    /// With an address, returns exactly that client. Without one, returns the
    /// most recently seen client, preferring the lowest channel id on ties.
    pub fn pick_channel(&self, app: i32, address: Option<&str>) -> Option<Arc<dyn ClientChannel>> {
        let indices = self.lock();
        let id = match address {
            Some(address) => *indices.app_addr.get(&app)?.get(address)?,
            None => {
                let (_, newest) = indices.app_time.get(&app)?.last_key_value()?;
                *newest.first()?
            }
        };
        indices
            .chan_info
            .get(&id)
            .map(|entry| Arc::clone(&entry.channel))
    }

    /// Registry state for one channel.
    pub fn info(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.lock().chan_info.get(&id).map(|entry| entry.info.clone())
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.lock().chan_info.len()
    }

    /// Returns `true` when no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered channels of `app`, ordered by address.
    pub fn snapshot(&self, app: i32) -> Vec<(String, ChannelInfo)> {
        let indices = self.lock();
        let mut entries: Vec<(String, ChannelInfo)> = indices
            .chan_info
            .values()
            .filter(|entry| entry.info.app == app)
            .map(|entry| (entry.info.address.clone(), entry.info.clone()))
            .collect();
        entries.sort_by(|left, right| left.0.cmp(&right.0));
        entries
    }

    /// Verifies that the three indices agree. Returns a description of the
    /// first disagreement found.
    #[cfg(test)]
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        let indices = self.lock();
        for (id, entry) in &indices.chan_info {
            let info = &entry.info;
            if entry.channel.id() != *id {
                return Err(format!("{id} stored under a foreign key"));
            }
            let by_address = indices
                .app_addr
                .get(&info.app)
                .and_then(|addresses| addresses.get(&info.address));
            if by_address != Some(id) {
                return Err(format!("{id} missing from app_addr"));
            }
            let in_bucket = indices
                .app_time
                .get(&info.app)
                .and_then(|buckets| buckets.get(&info.last_seen))
                .is_some_and(|bucket| bucket.contains(id));
            if !in_bucket {
                return Err(format!("{id} missing from app_time at {}", info.last_seen));
            }
        }
        let by_address: usize = indices.app_addr.values().map(HashMap::len).sum();
        let by_time: usize = indices
            .app_time
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum();
        if by_address != indices.chan_info.len() || by_time != indices.chan_info.len() {
            return Err(format!(
                "index sizes differ: chan_info={} app_addr={by_address} app_time={by_time}",
                indices.chan_info.len()
            ));
        }
        if indices.app_addr.values().any(HashMap::is_empty) {
            return Err("empty per-app address map".to_owned());
        }
        if indices
            .app_time
            .values()
            .any(|buckets| buckets.is_empty() || buckets.values().any(BTreeSet::is_empty))
        {
            return Err("empty timestamp bucket".to_owned());
        }
        Ok(())
    }
}
