//! Startup and reconfiguration orchestration.
//!
//! # Responsibilities
//! - Install configured extensions and mappings while the factory is
//!   Starting, so they persist across later stop/start cycles
//! - Apply a reloaded configuration through a full stop/start cycle
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned to the caller
//! - Mappings dropped from the configuration are removed explicitly;
//!   persistence alone would keep them forever

use std::collections::HashSet;

use crate::config::RouterConfig;
use crate::endpoints::creator_for;
use crate::extensions::builtin::{self, BUILTIN_EXTENSIONS};
use crate::factory::UpgradeFactory;
use crate::lifecycle::state::{LifecycleError, LifecycleState};
use crate::pathspec::{PathSpec, PathSpecError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("invalid mapping: {0}")]
    Spec(#[from] PathSpecError),

    #[error("unknown extension `{0}`")]
    UnknownExtension(String),
}

/// Stopped → Starting → Started, installing everything `config` declares.
pub fn start_factory(factory: &UpgradeFactory, config: &RouterConfig) -> Result<(), StartupError> {
    factory.begin_start()?;
    install(factory, config)?;
    factory.finish_start()?;

    tracing::info!(
        mappings = config.mappings.len(),
        extensions = ?factory.extension_registry().names(),
        "Upgrade factory started"
    );
    Ok(())
}

/// Stop the factory and start it again with `next`.
///
/// `next` is installed before anything `previous` declared is removed, so
/// specs declared by both stay routable throughout.
pub fn reconfigure(
    factory: &UpgradeFactory,
    previous: &RouterConfig,
    next: &RouterConfig,
) -> Result<(), StartupError> {
    if factory.lifecycle_state() == LifecycleState::Started {
        factory.stop()?;
    }

    factory.begin_start()?;
    install(factory, next)?;

    let declared = next
        .mappings
        .iter()
        .map(|mapping| PathSpec::parse(&mapping.spec))
        .collect::<Result<HashSet<_>, _>>()?;
    let mut removed = 0;
    for mapping in &previous.mappings {
        let spec = PathSpec::parse(&mapping.spec)?;
        if !declared.contains(&spec) && factory.remove_mapping(&spec) {
            removed += 1;
        }
    }

    factory.finish_start()?;
    tracing::info!(
        mappings = next.mappings.len(),
        removed,
        extensions = ?factory.extension_registry().names(),
        "Upgrade factory reconfigured"
    );
    Ok(())
}

fn install(factory: &UpgradeFactory, config: &RouterConfig) -> Result<(), StartupError> {
    let registry = factory.extension_registry();
    for name in BUILTIN_EXTENSIONS {
        if !config.extensions.enabled.iter().any(|enabled| enabled == name) {
            registry.unregister(name);
        }
    }
    for name in &config.extensions.enabled {
        let descriptor = builtin::descriptor(name)
            .ok_or_else(|| StartupError::UnknownExtension(name.clone()))?;
        registry.register_descriptor(descriptor);
    }

    factory.set_session_config(config.session.clone());

    for mapping in &config.mappings {
        factory.add_mapping(mapping.spec.as_str(), creator_for(mapping))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingConfig;

    fn config(mappings: Vec<MappingConfig>) -> RouterConfig {
        RouterConfig {
            mappings,
            ..RouterConfig::default()
        }
    }

    #[test]
    fn test_configured_mappings_are_persistent() {
        let factory = UpgradeFactory::new();
        start_factory(&factory, &config(vec![MappingConfig::echo("/a/*")])).unwrap();
        assert!(factory.is_started());
        assert!(factory.mappings().iter().all(|m| m.persistent));
    }

    #[test]
    fn test_reconfigure_swaps_mappings_and_prunes_ephemeral() {
        let factory = UpgradeFactory::new();
        let first = config(vec![MappingConfig::echo("/old"), MappingConfig::echo("/kept")]);
        let second = config(vec![MappingConfig::echo("/kept"), MappingConfig::echo("/new")]);
        start_factory(&factory, &first).unwrap();
        factory
            .add_mapping("/runtime", creator_for(&MappingConfig::echo("/runtime")))
            .unwrap();

        reconfigure(&factory, &first, &second).unwrap();

        let specs: Vec<_> = factory.mappings().into_iter().map(|m| m.spec).collect();
        assert_eq!(specs, vec!["/kept".to_string(), "/new".to_string()]);
        assert!(factory.is_started());
    }

    #[test]
    fn test_disabled_builtins_are_unregistered() {
        let factory = UpgradeFactory::new();
        let mut cfg = config(Vec::new());
        cfg.extensions.enabled = vec![builtin::IDENTITY.to_string()];
        start_factory(&factory, &cfg).unwrap();
        assert_eq!(factory.extension_registry().names(), vec!["identity".to_string()]);
    }

    #[test]
    fn test_start_twice_is_illegal() {
        let factory = UpgradeFactory::new();
        start_factory(&factory, &RouterConfig::default()).unwrap();
        assert!(matches!(
            start_factory(&factory, &RouterConfig::default()),
            Err(StartupError::Lifecycle(_))
        ));
    }

    #[test]
    fn test_shared_mappings_stay_routable_during_reconfigure() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;
        use std::thread;

        let factory = Arc::new(UpgradeFactory::new());
        let first = config(vec![MappingConfig::echo("/kept"), MappingConfig::echo("/a")]);
        let second = config(vec![MappingConfig::echo("/kept"), MappingConfig::echo("/b")]);
        start_factory(&factory, &first).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let factory = factory.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut misses = 0;
                while !done.load(Ordering::Relaxed) {
                    if factory.get_match("/kept").is_none() {
                        misses += 1;
                    }
                }
                misses
            })
        };

        for round in 0..200 {
            let (previous, next) = if round % 2 == 0 { (&first, &second) } else { (&second, &first) };
            reconfigure(&factory, previous, next).unwrap();
        }
        done.store(true, Ordering::Relaxed);

        assert_eq!(reader.join().unwrap(), 0);
        let specs: Vec<_> = factory.mappings().into_iter().map(|m| m.spec).collect();
        assert_eq!(specs, vec!["/kept".to_string(), "/a".to_string()]);
    }
}
