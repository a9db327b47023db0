//! Lazily-initialized model handle.
//!
//! ```ignore
//! let model = LazyModel::new(Arc::new(MyClientFactory::from_env()));
//!
//! // First call builds the client; later calls reuse it.
//! let client = model.get().await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::{GroundedModel, ProviderError};

/// Builds a model client on first use.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Create the client. May read credentials or open connections.
    async fn create(&self) -> Result<Arc<dyn GroundedModel>, ProviderError>;

    /// Identifier for logs.
    fn name(&self) -> &str;
}

/// A model client created at most once, on first use.
///
/// Concurrent first callers wait on the same initialization. A failed
/// initialization is not cached; the next call tries again.
pub struct LazyModel {
    factory: Arc<dyn ClientFactory>,
    client: OnceCell<Arc<dyn GroundedModel>>,
}

impl LazyModel {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            client: OnceCell::new(),
        }
    }

    /// A handle that is already initialized with `model`.
    pub fn ready(model: Arc<dyn GroundedModel>) -> Self {
        Self {
            factory: Arc::new(Ready(model.clone())),
            client: OnceCell::new_with(Some(model)),
        }
    }

    /// Get the client, creating it if needed.
    pub async fn get(&self) -> Result<Arc<dyn GroundedModel>, ProviderError> {
        self.client
            .get_or_try_init(|| async {
                let created = self.factory.create().await;
                match &created {
                    Ok(client) => info!(
                        factory = self.factory.name(),
                        model = client.name(),
                        "Model client initialized"
                    ),
                    Err(e) => warn!(
                        factory = self.factory.name(),
                        error = %e,
                        "Model client initialization failed"
                    ),
                }
                created
            })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    pub fn factory_name(&self) -> &str {
        self.factory.name()
    }
}

struct Ready(Arc<dyn GroundedModel>);

#[async_trait]
impl ClientFactory for Ready {
    async fn create(&self) -> Result<Arc<dyn GroundedModel>, ProviderError> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{AnalysisRequest, ReplayModel};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use veriscan_core::ModelOutput;

    struct CountingFactory {
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl CountingFactory {
        fn new(fail_first: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn create(&self) -> Result<Arc<dyn GroundedModel>, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_first && call == 0 {
                return Err(ProviderError::NotConfigured("missing credentials".to_string()));
            }
            Ok(Arc::new(ReplayModel::new(ModelOutput::text("{}"))))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_initialized_once_under_concurrency() {
        let factory = Arc::new(CountingFactory::new(false));
        let lazy = Arc::new(LazyModel::new(factory.clone()));
        assert!(!lazy.is_initialized());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lazy = lazy.clone();
                tokio::spawn(async move { lazy.get().await.map(|m| m.name().to_string()) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "replay");
        }
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert!(lazy.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_init_retried() {
        let factory = Arc::new(CountingFactory::new(true));
        let lazy = LazyModel::new(factory.clone());

        assert!(matches!(lazy.get().await, Err(ProviderError::NotConfigured(_))));
        assert!(!lazy.is_initialized());

        let client = lazy.get().await.unwrap();
        let output = client.generate(&AnalysisRequest::text("r1", "claim")).await.unwrap();
        assert_eq!(output.text, "{}");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let lazy = LazyModel::ready(Arc::new(ReplayModel::new(ModelOutput::text("x"))));
        assert!(lazy.is_initialized());
        assert_eq!(lazy.factory_name(), "replay");
        assert_eq!(lazy.get().await.unwrap().name(), "replay");
    }
}
