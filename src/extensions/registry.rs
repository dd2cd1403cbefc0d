//! Extension registry.
//!
//! # Responsibilities
//! - Map extension names to factories that build negotiation units
//! - Resolve a client's ordered offers into the negotiated chain
//!
//! # Design Decisions
//! - Same copy-on-write publication as the mapping registry
//! - Output order follows the client's offers, never the registry's
//! - Unknown names and declined offers are omitted, not errors
//! - The first acceptable offer per name wins; later offers are fallbacks

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::extensions::config::ExtensionConfig;

/// A negotiated extension bound to one session.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Parameters the server answers with for this extension.
    fn negotiated(&self) -> ExtensionConfig;
}

/// Reasons a factory declines an offer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    #[error("extension `{name}` does not accept parameter `{param}`")]
    UnsupportedParam { name: String, param: String },

    #[error("extension `{name}` parameter `{param}` has invalid value `{value}`")]
    InvalidParam {
        name: String,
        param: String,
        value: String,
    },
}

pub type ExtensionFactory =
    Arc<dyn Fn(&ExtensionConfig) -> Result<Box<dyn Extension>, ExtensionError> + Send + Sync>;

/// Name plus the factory that builds a unit from a client offer.
#[derive(Clone)]
pub struct ExtensionDescriptor {
    name: String,
    factory: ExtensionFactory,
}

impl ExtensionDescriptor {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ExtensionConfig) -> Result<Box<dyn Extension>, ExtensionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self, offer: &ExtensionConfig) -> Result<Box<dyn Extension>, ExtensionError> {
        (self.factory)(offer)
    }
}

impl fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDescriptor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name-keyed table of extension factories.
pub struct ExtensionRegistry {
    descriptors: ArcSwap<HashMap<String, ExtensionDescriptor>>,
}

impl ExtensionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            descriptors: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// A registry preloaded with every built-in extension.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for descriptor in crate::extensions::builtin::descriptors() {
            registry.register_descriptor(descriptor);
        }
        registry
    }

    /// Register `factory` under `name`, replacing any earlier registration.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ExtensionConfig) -> Result<Box<dyn Extension>, ExtensionError> + Send + Sync + 'static,
    {
        self.register_descriptor(ExtensionDescriptor::new(name, factory));
    }

    pub fn register_descriptor(&self, descriptor: ExtensionDescriptor) {
        let name = descriptor.name.clone();
        let previous = self.descriptors.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), descriptor.clone());
            next
        });
        tracing::debug!(
            extension = %name,
            replaced = previous.contains_key(&name),
            "Extension registered"
        );
    }

    /// Returns false if `name` was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let previous = self.descriptors.rcu(|current| {
            if !current.contains_key(name) {
                return Arc::clone(current);
            }
            let mut next = HashMap::clone(current);
            next.remove(name);
            Arc::new(next)
        });
        let removed = previous.contains_key(name);
        if removed {
            tracing::debug!(extension = %name, "Extension unregistered");
        }
        removed
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.descriptors.load().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.descriptors.load().keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the negotiated chain for the client's offers.
    pub fn resolve(&self, offers: &[ExtensionConfig]) -> Vec<Box<dyn Extension>> {
        let descriptors = self.descriptors.load();
        let mut negotiated: Vec<Box<dyn Extension>> = Vec::new();
        let mut accepted = HashSet::new();

        for offer in offers {
            if accepted.contains(offer.name.as_str()) {
                continue;
            }
            let Some(descriptor) = descriptors.get(&offer.name) else {
                tracing::trace!(extension = %offer.name, "Ignoring unknown extension");
                continue;
            };
            match descriptor.build(offer) {
                Ok(extension) => {
                    accepted.insert(offer.name.as_str());
                    negotiated.push(extension);
                }
                Err(e) => {
                    tracing::debug!(extension = %offer.name, error = %e, "Extension offer declined");
                }
            }
        }
        negotiated
    }

    /// Resolve bare names, as if each were offered without parameters.
    pub fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<Box<dyn Extension>> {
        let offers: Vec<_> = names
            .iter()
            .map(|name| ExtensionConfig::new(name.as_ref()))
            .collect();
        self.resolve(&offers)
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
