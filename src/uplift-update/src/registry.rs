//! Registration registry.

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::config::ComponentConfig;
use crate::error::{UpdateError, UpdateResult};

/// Table of registered components, owned by the host's composition root.
///
/// A slug registers once; later registrations are rejected and the first
/// configuration stays in place.
#[derive(Debug, Default)]
pub struct Registry {
    components: RwLock<IndexMap<String, ComponentConfig>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component.
    pub fn register(&self, config: ComponentConfig) -> UpdateResult<()> {
        config.locator()?;

        let mut components = self.components.write();
        if components.contains_key(&config.slug) {
            tracing::warn!(slug = %config.slug, "Component registered twice, keeping the first registration");
            return Err(UpdateError::AlreadyRegistered { slug: config.slug });
        }

        tracing::debug!(slug = %config.slug, repository = %config.repository, "Registered component");
        components.insert(config.slug.clone(), config);
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<ComponentConfig> {
        self.components.read().get(slug).cloned()
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.components.read().contains_key(slug)
    }

    /// Registered slugs in registration order.
    pub fn slugs(&self) -> Vec<String> {
        self.components.read().keys().cloned().collect()
    }

    /// Registered configurations in registration order.
    pub fn configs(&self) -> Vec<ComponentConfig> {
        self.components.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.components.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.read().is_empty()
    }
}
