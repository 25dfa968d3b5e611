use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::{create_llm, LLMConfig, LLMProvider, LLM};

/// Identity of a generation back-end.
///
/// Two configs with the same key share one provider instance. The API key
/// only enters the key as an md5 fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GatewayKey {
    pub provider: LLMProvider,
    pub endpoint: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
    pub api_key_fingerprint: Option<String>,
}

impl From<&LLMConfig> for GatewayKey {
    fn from(config: &LLMConfig) -> Self {
        Self {
            provider: config.provider,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout_seconds: config.timeout_seconds,
            api_key_fingerprint: config
                .api_key
                .as_ref()
                .map(|key| format!("{:x}", md5::compute(key.as_bytes()))),
        }
    }
}

type LlmFactory = dyn Fn(&LLMConfig) -> Result<Arc<dyn LLM>> + Send + Sync;

/// Lazily built, shared generation back-ends keyed by configuration
pub struct GenerationGateway {
    factory: Arc<LlmFactory>,
    cache: RwLock<HashMap<GatewayKey, Arc<dyn LLM>>>,
    load_lock: Mutex<()>,
}

impl Default for GenerationGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationGateway {
    pub fn new() -> Self {
        Self::with_factory(|config| create_llm(config).map(Arc::from))
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&LLMConfig) -> Result<Arc<dyn LLM>> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            cache: RwLock::new(HashMap::new()),
            load_lock: Mutex::new(()),
        }
    }

    /// Return the cached back-end for `config`, building it on first use.
    ///
    /// Concurrent first callers for the same key build it once: the loser of
    /// the load lock finds the winner's instance on re-check.
    pub async fn get_or_create(&self, config: &LLMConfig) -> Result<Arc<dyn LLM>> {
        let key = GatewayKey::from(config);

        if let Some(llm) = self.cache.read().await.get(&key) {
            return Ok(Arc::clone(llm));
        }

        let _guard = self.load_lock.lock().await;

        if let Some(llm) = self.cache.read().await.get(&key) {
            debug!("Generation back-end for {} built by a concurrent caller", key.model);
            return Ok(Arc::clone(llm));
        }

        info!("🤖 Initializing {:?} generation back-end ({})", key.provider, key.model);
        let llm = (self.factory)(config)?;
        self.cache.write().await.insert(key, Arc::clone(&llm));

        Ok(llm)
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLLM;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_gateway(builds: Arc<AtomicUsize>) -> GenerationGateway {
        GenerationGateway::with_factory(move |_config| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(ScriptedLLM::replying(&[])) as Arc<dyn LLM>)
        })
    }

    #[tokio::test]
    async fn test_same_config_built_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let gateway = counting_gateway(Arc::clone(&builds));
        let config = LLMConfig::default();

        let first = gateway.get_or_create(&config).await.unwrap();
        let second = gateway.get_or_create(&config).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.cached_count().await, 1);
    }

    #[tokio::test]
    async fn test_different_models_get_separate_entries() {
        let builds = Arc::new(AtomicUsize::new(0));
        let gateway = counting_gateway(Arc::clone(&builds));
        let other = LLMConfig {
            model: "another-model".to_string(),
            ..LLMConfig::default()
        };

        gateway.get_or_create(&LLMConfig::default()).await.unwrap();
        gateway.get_or_create(&other).await.unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let gateway = Arc::new(counting_gateway(Arc::clone(&builds)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gateway = Arc::clone(&gateway);
                tokio::spawn(async move { gateway.get_or_create(&LLMConfig::default()).await.is_ok() })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_factory_error_is_not_cached() {
        let gateway = GenerationGateway::with_factory(|_| Err(anyhow::anyhow!("model missing")));
        assert!(gateway.get_or_create(&LLMConfig::default()).await.is_err());
        assert_eq!(gateway.cached_count().await, 0);
    }

    #[test]
    fn test_key_hides_api_key() {
        let config = LLMConfig {
            api_key: Some("secret".to_string()),
            ..LLMConfig::default()
        };
        let key = GatewayKey::from(&config);
        let fingerprint = key.api_key_fingerprint.unwrap();
        assert_ne!(fingerprint, "secret");
        assert_eq!(fingerprint.len(), 32);
    }
}
