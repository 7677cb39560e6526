//! Room registry: creates, finds, and reclaims rooms.
//!
//! The registry is the only index of live rooms. It owns nothing but
//! handles — each room's state lives inside its own actor — so registry
//! operations never contend with in-flight game traffic. The server owns
//! one registry behind a mutex and runs [`RoomRegistry::evict_idle`] on
//! a fixed interval to bound memory growth from abandoned rooms.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

use castle_protocol::{RoomCode, TimeControl};

use crate::room::spawn_room;
use crate::{RoomHandle, RoomSettings, RulesEngine};

/// Index of all active rooms, keyed by their shareable code.
pub struct RoomRegistry<R: RulesEngine> {
    rooms: HashMap<RoomCode, RoomHandle>,
    settings: RoomSettings,
    _rules: PhantomData<fn() -> R>,
}

impl<R: RulesEngine> RoomRegistry<R> {
    /// Creates an empty registry with the given per-room settings.
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: HashMap::new(),
            settings,
            _rules: PhantomData,
        }
    }

    /// Allocates a fresh room in the Waiting phase and returns its code.
    ///
    /// Codes are random six-character strings; on the rare collision we
    /// simply draw again.
    pub fn create(&mut self, time_control: TimeControl) -> RoomCode {
        let mut rng = rand::rng();
        let code = loop {
            let candidate = RoomCode::generate(&mut rng);
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let handle =
            spawn_room::<R>(code.clone(), self.settings.clone(), time_control);
        self.rooms.insert(code.clone(), handle);
        tracing::info!(room = %code, "room created");
        code
    }

    /// Finds a room by code.
    ///
    /// A room whose actor has exited (abandonment forfeit, finished
    /// teardown) is pruned here and reported as not found — dead rooms
    /// stop being findable the moment anyone looks.
    pub fn lookup(&mut self, code: &RoomCode) -> Option<RoomHandle> {
        match self.rooms.get(code) {
            Some(handle) if handle.is_closed() => {
                self.rooms.remove(code);
                None
            }
            Some(handle) => Some(handle.clone()),
            None => None,
        }
    }

    /// Removes a room unconditionally. Idempotent — removing a missing
    /// or already-torn-down room has no observable effect.
    pub async fn remove(&mut self, code: &RoomCode) {
        if let Some(handle) = self.rooms.remove(code) {
            let _ = handle.teardown().await;
            tracing::info!(room = %code, "room removed");
        }
    }

    /// Removes every room idle longer than `ttl`, plus any whose actor
    /// has already exited. Returns the evicted codes.
    pub async fn evict_idle(&mut self, now: Instant, ttl: Duration) -> Vec<RoomCode> {
        let mut evicted = Vec::new();

        let handles: Vec<RoomHandle> = self.rooms.values().cloned().collect();
        for handle in handles {
            let stale = match handle.status().await {
                Ok(status) => {
                    now.saturating_duration_since(status.last_activity) > ttl
                }
                // Actor gone — reclaim the entry.
                Err(_) => true,
            };
            if stale {
                evicted.push(handle.code().clone());
            }
        }

        for code in &evicted {
            if let Some(handle) = self.rooms.remove(code) {
                let _ = handle.teardown().await;
                tracing::info!(room = %code, "idle room evicted");
            }
        }

        evicted
    }

    /// Number of registered rooms (live or not yet pruned).
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// All registered room codes.
    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    /// The settings rooms are created with.
    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }
}
