//! The upgrade factory: owner of the mapping and extension registries.
//!
//! # Responsibilities
//! - Expose mapping operations (add / remove / get / match / register)
//! - Stamp each registration with the lifecycle state it was made in
//! - Prune ephemeral registrations when the configuration stops
//! - Carry the session policy applied to every accepted upgrade
//!
//! # Design Decisions
//! - Registries are owned here and only reachable through the factory,
//!   so nothing can use a registry without its configuration
//! - Creators and extension factories are shared via `Arc`, never owned

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::extensions::{Extension, ExtensionConfig, ExtensionRegistry};
use crate::lifecycle::state::{Lifecycle, LifecycleError, LifecycleState};
use crate::mapping::{Creator, DefaultCreator, Endpoint, MappingRegistry, Registration};
use crate::observability::metrics;
use crate::pathspec::{IntoPathSpec, PathSpec, PathSpecError, PathSpecGroup};

/// Outcome of resolving a request path.
#[derive(Clone)]
pub struct MatchedMapping {
    pub registration: Arc<Registration>,
    pub path_params: BTreeMap<String, String>,
}

impl MatchedMapping {
    pub fn spec(&self) -> &PathSpec {
        &self.registration.spec
    }

    pub fn creator(&self) -> Arc<dyn Creator> {
        self.registration.creator.clone()
    }
}

/// Serializable view of one registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingInfo {
    pub spec: String,
    pub group: PathSpecGroup,
    pub persistent: bool,
}

/// Upgrade configuration shared by every connection of a server.
pub struct UpgradeFactory {
    mappings: MappingRegistry,
    extensions: ExtensionRegistry,
    lifecycle: Lifecycle,
    session: ArcSwap<SessionConfig>,
}

impl UpgradeFactory {
    /// A stopped factory with the built-in extensions registered.
    pub fn new() -> Self {
        Self::with_extensions(ExtensionRegistry::with_builtins())
    }

    pub fn with_extensions(extensions: ExtensionRegistry) -> Self {
        Self {
            mappings: MappingRegistry::new(),
            extensions,
            lifecycle: Lifecycle::new(),
            session: ArcSwap::from_pointee(SessionConfig::default()),
        }
    }

    // --- Mappings ---

    /// Insert or replace the mapping for `spec`.
    ///
    /// Mappings added before the factory is started persist across
    /// stop/start; mappings added while started are removed on stop.
    pub fn add_mapping(
        &self,
        spec: impl IntoPathSpec,
        creator: Arc<dyn Creator>,
    ) -> Result<(), PathSpecError> {
        let spec = spec.into_path_spec()?;
        self.lifecycle.with_state(|state| {
            self.mappings
                .insert(spec, creator, state.registers_persistent());
        });
        metrics::record_mapping_count(self.mappings.len());
        Ok(())
    }

    /// Returns true if a mapping existed and was removed.
    pub fn remove_mapping(&self, spec: &PathSpec) -> bool {
        let removed = self.mappings.remove(spec);
        if removed {
            metrics::record_mapping_count(self.mappings.len());
        }
        removed
    }

    /// Exact structural lookup; performs no path matching.
    pub fn get_mapping(&self, spec: &PathSpec) -> Option<Arc<Registration>> {
        self.mappings.get(spec)
    }

    /// Creator of the best mapping for `target`.
    pub fn get_match(&self, target: &str) -> Option<Arc<dyn Creator>> {
        self.get_match_detail(target).map(|matched| matched.creator())
    }

    /// Best mapping for `target` together with its captured params.
    pub fn get_match_detail(&self, target: &str) -> Option<MatchedMapping> {
        let registration = self.mappings.find(target)?;
        let path_params = registration.spec.path_params(target).unwrap_or_default();
        metrics::record_match(registration.spec.group());
        Some(MatchedMapping {
            registration,
            path_params,
        })
    }

    /// Map `/` to a creator that instantiates `E::default()`.
    pub fn register<E>(&self)
    where
        E: Endpoint + Default + 'static,
    {
        let creator = DefaultCreator::<E>::new();
        tracing::debug!(endpoint = creator.endpoint_type(), "Registering default endpoint");
        self.set_creator(Arc::new(creator));
    }

    /// Map `/` to `creator`.
    pub fn set_creator(&self, creator: Arc<dyn Creator>) {
        self.lifecycle.with_state(|state| {
            self.mappings
                .insert(PathSpec::root(), creator, state.registers_persistent());
        });
        metrics::record_mapping_count(self.mappings.len());
    }

    pub fn parse_path_spec(&self, raw: &str) -> Result<PathSpec, PathSpecError> {
        PathSpec::parse(raw)
    }

    pub fn mappings(&self) -> Vec<MappingInfo> {
        self.mappings
            .entries()
            .iter()
            .map(|entry| MappingInfo {
                spec: entry.spec.to_string(),
                group: entry.spec.group(),
                persistent: entry.persistent,
            })
            .collect()
    }

    // --- Extensions ---

    pub fn extension_registry(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// Negotiated chain for the client's offers, in offer order.
    pub fn negotiate(&self, offers: &[ExtensionConfig]) -> Vec<Box<dyn Extension>> {
        self.extensions.resolve(offers)
    }

    // --- Session policy ---

    pub fn session_config(&self) -> Arc<SessionConfig> {
        self.session.load_full()
    }

    pub fn set_session_config(&self, config: SessionConfig) {
        self.session.store(Arc::new(config));
    }

    /// Apply `update` to a copy of the current policy and publish it.
    pub fn update_session_config(&self, update: impl Fn(&mut SessionConfig)) {
        self.session.rcu(|current| {
            let mut next = SessionConfig::clone(current);
            update(&mut next);
            next
        });
    }

    // --- Lifecycle ---

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn is_started(&self) -> bool {
        self.lifecycle_state() == LifecycleState::Started
    }

    /// Stopped → Starting. Registrations made while starting persist.
    pub fn begin_start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.advance(LifecycleState::Starting, || ())
    }

    /// Starting → Started.
    pub fn finish_start(&self) -> Result<(), LifecycleError> {
        self.lifecycle.advance(LifecycleState::Started, || ())
    }

    /// Started → Stopping, removing every ephemeral registration.
    pub fn begin_stop(&self) -> Result<(), LifecycleError> {
        let pruned = self.lifecycle.advance(LifecycleState::Stopping, || {
            self.mappings.retain(|entry| entry.persistent)
        })?;
        for entry in &pruned {
            tracing::debug!(spec = %entry.spec, "Ephemeral mapping pruned");
        }
        if !pruned.is_empty() {
            tracing::info!(pruned = pruned.len(), "Ephemeral mappings removed on stop");
        }
        metrics::record_mapping_count(self.mappings.len());
        Ok(())
    }

    /// Stopping → Stopped.
    pub fn finish_stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle.advance(LifecycleState::Stopped, || ())
    }

    pub fn start(&self) -> Result<(), LifecycleError> {
        self.begin_start()?;
        self.finish_start()
    }

    pub fn stop(&self) -> Result<(), LifecycleError> {
        self.begin_stop()?;
        self.finish_stop()
    }
}

impl Default for UpgradeFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{creator_fn, Message, Rejection, UpgradeRequest, UpgradeResponse};
    use axum::http::StatusCode;

    #[derive(Default)]
    struct Echo;

    impl Endpoint for Echo {
        fn on_message(&mut self, message: Message) -> Option<Message> {
            Some(message)
        }
    }

    fn refuse() -> Arc<dyn Creator> {
        creator_fn(|_, _| Err(Rejection::new(StatusCode::GONE, "gone")))
    }

    fn spec(raw: &str) -> PathSpec {
        PathSpec::parse(raw).unwrap()
    }

    #[test]
    fn test_persistence_follows_state() {
        let factory = UpgradeFactory::new();
        factory.add_mapping("/durable", refuse()).unwrap();
        factory.start().unwrap();
        factory.add_mapping("/ephemeral", refuse()).unwrap();

        let info = factory.mappings();
        assert_eq!(info.len(), 2);
        assert!(info[0].persistent);
        assert!(!info[1].persistent);

        factory.stop().unwrap();
        assert!(factory.get_mapping(&spec("/durable")).is_some());
        assert!(factory.get_mapping(&spec("/ephemeral")).is_none());
    }

    #[test]
    fn test_register_maps_root() {
        let factory = UpgradeFactory::new();
        factory.register::<Echo>();
        let creator = factory.get_match("/any/path").unwrap();
        let mut endpoint = creator
            .create(&UpgradeRequest::new("/any/path"), &mut UpgradeResponse::default())
            .unwrap();
        assert_eq!(
            endpoint.on_message(Message::Text("hi".into())),
            Some(Message::Text("hi".into()))
        );
    }

    #[test]
    fn test_match_detail_carries_params() {
        let factory = UpgradeFactory::new();
        factory.add_mapping("uri-template|/rooms/{room}", refuse()).unwrap();
        let matched = factory.get_match_detail("/rooms/lobby").unwrap();
        assert_eq!(matched.spec().group(), PathSpecGroup::Template);
        assert_eq!(matched.path_params["room"], "lobby");
    }

    #[test]
    fn test_malformed_spec_is_reported() {
        let factory = UpgradeFactory::new();
        assert!(factory.add_mapping("no-slash", refuse()).is_err());
        assert!(factory.mappings().is_empty());
    }

    #[test]
    fn test_session_config_update() {
        let factory = UpgradeFactory::new();
        factory.update_session_config(|session| session.idle_timeout_secs = 5);
        assert_eq!(factory.session_config().idle_timeout_secs, 5);
    }
}
