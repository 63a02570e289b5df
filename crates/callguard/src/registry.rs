use crate::client::ResilientClient;
use crate::settings::ResilienceSettings;
use callguard_core::ConfigError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

type ClientFactory = Box<dyn Fn(&str) -> Result<ResilientClient, ConfigError> + Send + Sync>;

/// One [`ResilientClient`] per resource name, created on first use.
///
/// Each resource gets its own breaker, bulkhead and limiter; nothing is
/// shared between names. The map lock is held only to look up or insert a
/// client, never while a call runs.
///
/// ```rust
/// use callguard::{ClientRegistry, ResilienceSettings};
///
/// let registry = ClientRegistry::from_settings(ResilienceSettings::default());
/// let openai = registry.get("openai").unwrap();
/// let anthropic = registry.get("anthropic").unwrap();
/// assert_eq!(openai.circuit_breaker().name(), "openai");
/// assert_eq!(anthropic.circuit_breaker().name(), "anthropic");
/// ```
pub struct ClientRegistry {
    clients: Mutex<HashMap<String, ResilientClient>>,
    factory: ClientFactory,
}

impl ClientRegistry {
    /// Creates a registry that builds clients with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Result<ResilientClient, ConfigError> + Send + Sync + 'static,
    {
        Self {
            clients: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    /// Creates a registry that builds every client from the same settings.
    pub fn from_settings(settings: ResilienceSettings) -> Self {
        Self::new(move |name| settings.client_builder(name).build())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ResilientClient>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the client for `name`, building it on first use.
    pub fn get(&self, name: &str) -> Result<ResilientClient, ConfigError> {
        if let Some(client) = self.lock().get(name) {
            return Ok(client.clone());
        }

        // Built outside the lock. If another caller raced us, theirs wins.
        let built = (self.factory)(name)?;
        let client = self
            .lock()
            .entry(name.to_string())
            .or_insert(built)
            .clone();

        #[cfg(feature = "tracing")]
        tracing::debug!(client = %name, "registered resilient client");

        Ok(client)
    }

    /// Returns `true` if a client for `name` has been built.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Names of every client built so far, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of clients built so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no client has been built yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Resets the circuit breaker of every client.
    pub fn reset_all(&self) {
        let clients: Vec<ResilientClient> = self.lock().values().cloned().collect();
        for client in clients {
            client.reset();
        }
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.names())
            .finish_non_exhaustive()
    }
}
