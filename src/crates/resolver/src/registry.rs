//! Integration metadata lookup

use crate::types::Integration;
use std::collections::HashMap;

/// Read-only view of registered integrations.
pub trait IntegrationRegistry: Send + Sync {
    fn get(&self, id: &str) -> Option<Integration>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    integrations: HashMap<String, Integration>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integration(mut self, integration: Integration) -> Self {
        self.integrations.insert(integration.id.clone(), integration);
        self
    }

    pub fn len(&self) -> usize {
        self.integrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrations.is_empty()
    }
}

impl FromIterator<Integration> for InMemoryRegistry {
    fn from_iter<T: IntoIterator<Item = Integration>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |registry, integration| registry.with_integration(integration))
    }
}

impl IntegrationRegistry for InMemoryRegistry {
    fn get(&self, id: &str) -> Option<Integration> {
        self.integrations.get(id).cloned()
    }
}
