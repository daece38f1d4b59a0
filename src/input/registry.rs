//! Central registry for every handler bound to the map engine
//!
//! Each entry owns exactly one engine listener. Removing an entry, whether
//! one token at a time or through `unregister_all`, unsubscribes that listener
//! once, so a full teardown always leaves the engine with no listeners from
//! this registry no matter the order entries were added.

use crate::{
    input::events::{EngineCommand, EventKind, ListenerId, MapEvent},
    prelude::BTreeMap,
    traits::MapEngine,
};
use std::borrow::Cow;

/// Handler invoked on dispatch; may ask the engine for follow-up work
pub type EventHandler = Box<dyn FnMut(&MapEvent) -> Option<EngineCommand>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

/// Groups subscriptions so one owner can drop all of its handlers at once
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey(Cow<'static, str>);

impl ScopeKey {
    pub const ENGINE: ScopeKey = ScopeKey(Cow::Borrowed("engine"));
    pub const SELECTION: ScopeKey = ScopeKey(Cow::Borrowed("selection"));
    pub const HOST: ScopeKey = ScopeKey(Cow::Borrowed("host"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct SubscriptionEntry {
    kind: EventKind,
    handler: EventHandler,
    scope: ScopeKey,
    listener: ListenerId,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    /// Keyed by token so dispatch runs in registration order
    entries: BTreeMap<SubscriptionToken, SubscriptionEntry>,
    next_token: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `kind` on the engine. Without a scope the entry
    /// lands in [`ScopeKey::HOST`].
    pub fn register(
        &mut self,
        engine: &mut dyn MapEngine,
        kind: EventKind,
        handler: EventHandler,
        scope: Option<ScopeKey>,
    ) -> SubscriptionToken {
        let listener = engine.subscribe(kind);
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;

        let scope = scope.unwrap_or(ScopeKey::HOST);
        log::trace!("subscribe {} in scope '{}' -> {:?}", kind, scope.as_str(), token);

        self.entries.insert(
            token,
            SubscriptionEntry {
                kind,
                handler,
                scope,
                listener,
            },
        );
        token
    }

    /// Removes one entry; returns `false` for an unknown or already removed token
    pub fn unregister(&mut self, engine: &mut dyn MapEngine, token: SubscriptionToken) -> bool {
        match self.entries.remove(&token) {
            Some(entry) => {
                Self::release(engine, &entry);
                true
            }
            None => false,
        }
    }

    /// Removes every entry in `scope`, or every entry at all when `scope` is
    /// `None`. Returns how many were removed.
    pub fn unregister_all(&mut self, engine: &mut dyn MapEngine, scope: Option<&ScopeKey>) -> usize {
        let tokens: Vec<SubscriptionToken> = self
            .entries
            .iter()
            .filter(|(_, entry)| scope.map_or(true, |s| &entry.scope == s))
            .map(|(token, _)| *token)
            .collect();

        for token in &tokens {
            if let Some(entry) = self.entries.remove(token) {
                Self::release(engine, &entry);
            }
        }

        if !tokens.is_empty() {
            log::debug!(
                "unregistered {} subscriptions ({})",
                tokens.len(),
                scope.map_or("all scopes", |s| s.as_str())
            );
        }
        tokens.len()
    }

    fn release(engine: &mut dyn MapEngine, entry: &SubscriptionEntry) {
        if !engine.unsubscribe(entry.listener) {
            log::warn!(
                "engine had no listener {:?} for {} in scope '{}'",
                entry.listener,
                entry.kind,
                entry.scope.as_str()
            );
        }
    }

    /// Runs every handler subscribed to the event's kind and collects the
    /// commands they return
    pub fn dispatch(&mut self, event: &MapEvent) -> Vec<EngineCommand> {
        let kind = event.kind();
        self.entries
            .values_mut()
            .filter(|entry| entry.kind == kind)
            .filter_map(|entry| (entry.handler)(event))
            .collect()
    }

    pub fn contains(&self, token: SubscriptionToken) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn count_for(&self, kind: EventKind) -> usize {
        self.entries.values().filter(|e| e.kind == kind).count()
    }

    pub fn count_in(&self, scope: &ScopeKey) -> usize {
        self.entries.values().filter(|e| &e.scope == scope).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
