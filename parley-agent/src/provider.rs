// ABOUTME: Registry pattern for runtime agent selection plus a per-thread instance cache.
// ABOUTME: Agents register factories; threads resolve by bound agent name.

use crate::thread::Thread;
use crate::traits::Agent;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Factory function that creates an agent from config
pub type AgentFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn Agent>> + Send + Sync>;

/// Registry for runtime agent selection
pub struct AgentRegistry {
    factories: HashMap<String, AgentFactory>,
}

impl AgentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register an agent factory by name
    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<Arc<dyn Agent>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Create an agent by name with the given config
    pub fn create(&self, name: &str, config: &Value) -> Result<Arc<dyn Agent>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("Unknown agent: {}", name))?;
        factory(config)
    }

    /// List available agent names
    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        use crate::agents::echo::EchoAgent;
        use crate::testing::mock::MockAgent;

        Self::new()
            .register("echo", EchoAgent::factory())
            .register("mock", MockAgent::factory())
    }
}

/// Resolves the agent bound to a thread, caching instances per
/// `threadId:agentName` so conversation-scoped agent state survives
/// across calls. The cache is an explicit object owned by the caller,
/// never ambient process state.
pub struct AgentProvider {
    registry: AgentRegistry,
    cache: Mutex<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentProvider {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the agent for a thread, building it through the registry
    /// on a cache miss.
    pub fn resolve(&self, thread: &Thread) -> Result<Arc<dyn Agent>> {
        let key = format!("{}:{}", thread.id, thread.agent);
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| anyhow!("Agent cache mutex poisoned: {}", e))?;
        if let Some(agent) = cache.get(&key) {
            return Ok(Arc::clone(agent));
        }

        let agent = self.registry.create(&thread.agent, &Value::Null)?;
        tracing::debug!(thread_id = %thread.id, agent = %thread.agent, "Agent instantiated");
        cache.insert(key, Arc::clone(&agent));
        Ok(agent)
    }

    /// Drop cached instances for a thread (used when the thread's bound
    /// agent changes).
    pub fn invalidate(&self, thread_id: &str) {
        let prefix = format!("{}:", thread_id);
        if let Ok(mut cache) = self.cache.lock() {
            cache.retain(|key, _| !key.starts_with(&prefix));
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockAgent;

    #[test]
    fn test_registry_unknown_agent() {
        let registry = AgentRegistry::new();
        let err = registry.create("nope", &Value::Null).unwrap_err();
        assert!(err.to_string().contains("Unknown agent"));
    }

    #[test]
    fn test_registry_available() {
        let registry = AgentRegistry::default();
        let mut names = registry.available();
        names.sort();
        assert_eq!(names, vec!["echo", "mock"]);
    }

    #[test]
    fn test_provider_caches_per_thread_and_agent() {
        let provider = AgentProvider::new(AgentRegistry::default());
        let thread = Thread::new("test", "mock");

        let a = provider.resolve(&thread).unwrap();
        let b = provider.resolve(&thread).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = Thread::new("other", "mock");
        let c = provider.resolve(&other).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_provider_invalidate_drops_thread_instances() {
        let provider = AgentProvider::new(AgentRegistry::default());
        let thread = Thread::new("test", "mock");

        let a = provider.resolve(&thread).unwrap();
        provider.invalidate(&thread.id);
        let b = provider.resolve(&thread).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_custom_factory_registration() {
        let registry = AgentRegistry::new().register("scripted", |_cfg| {
            Ok(Arc::new(MockAgent::new()) as Arc<dyn Agent>)
        });
        assert!(registry.create("scripted", &Value::Null).is_ok());
    }
}
