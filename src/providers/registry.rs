//! Strategy-to-provider registry.

use super::{ProviderClient, StrategyKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps each strategy to the provider that serves it.
///
/// Registration order is irrelevant; the orchestrator walks strategies in
/// configured order and looks providers up here.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<StrategyKind, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the provider for a strategy.
    #[must_use]
    pub fn with_provider(mut self, strategy: StrategyKind, provider: Arc<dyn ProviderClient>) -> Self {
        self.register(strategy, provider);
        self
    }

    /// Registers (or replaces) the provider for a strategy.
    pub fn register(&mut self, strategy: StrategyKind, provider: Arc<dyn ProviderClient>) {
        self.providers.insert(strategy, provider);
    }

    /// Returns the provider for a strategy.
    #[must_use]
    pub fn get(&self, strategy: StrategyKind) -> Option<Arc<dyn ProviderClient>> {
        self.providers.get(&strategy).cloned()
    }

    /// Returns true when a provider is registered for the strategy.
    #[must_use]
    pub fn contains(&self, strategy: StrategyKind) -> bool {
        self.providers.contains_key(&strategy)
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self
            .providers
            .iter()
            .map(|(kind, provider)| format!("{kind}={}", provider.name()))
            .collect();
        names.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}
