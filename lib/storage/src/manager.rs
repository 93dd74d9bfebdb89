use estatex_core::{estimate_price, Error, PriceEstimate, PriceFeatures, RecommendationEngine, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::model_store::{ModelArtifact, ModelStamp, ModelStore};
use crate::source::ListingSource;

/// Fetch listings and build an engine.
///
/// Never fails: an unreachable source or an empty result leaves the engine
/// empty, and the reason is logged.
pub async fn load_engine<S: ListingSource>(source: &S) -> RecommendationEngine {
    match source.fetch_listings().await {
        Ok(documents) => RecommendationEngine::from_documents(&documents),
        Err(e) => {
            warn!("Error initializing recommendation engine: {}", e);
            RecommendationEngine::empty()
        }
    }
}

/// Shared service state: the current recommendation engine and the price
/// model store.
///
/// The engine sits behind an `Arc` that is replaced wholesale, so a reader
/// keeps a consistent snapshot for the whole query even while a new engine
/// is swapped in.
pub struct EngineManager {
    engine: RwLock<Arc<RecommendationEngine>>,
    models: ModelStore,
    model_cache: RwLock<Option<CachedModel>>,
}

/// Last artifact read from the model store and the file version it came from
struct CachedModel {
    stamp: ModelStamp,
    artifact: Arc<ModelArtifact>,
}

impl EngineManager {
    pub fn new(engine: RecommendationEngine, models: ModelStore) -> Self {
        Self {
            engine: RwLock::new(Arc::new(engine)),
            models,
            model_cache: RwLock::new(None),
        }
    }

    /// Build the initial engine from `source`. With no source configured the
    /// engine starts empty.
    pub async fn init<S: ListingSource>(source: Option<&S>, models: ModelStore) -> Self {
        let engine = match source {
            Some(source) => load_engine(source).await,
            None => {
                warn!("No listing source configured. Recommendation engine will be empty.");
                RecommendationEngine::empty()
            }
        };
        Self::new(engine, models)
    }

    /// Snapshot of the current engine
    #[inline]
    pub fn engine(&self) -> Arc<RecommendationEngine> {
        self.engine.read().clone()
    }

    /// Replace the engine, returning the previous one
    pub fn swap(&self, engine: RecommendationEngine) -> Arc<RecommendationEngine> {
        let next = Arc::new(engine);
        std::mem::replace(&mut *self.engine.write(), next)
    }

    /// Build a fresh engine from `source` and swap it in
    pub async fn reload<S: ListingSource>(&self, source: &S) -> usize {
        let engine = load_engine(source).await;
        let count = engine.len();
        self.swap(engine);
        info!("Recommendation engine reloaded with {} properties", count);
        count
    }

    pub fn models(&self) -> &ModelStore {
        &self.models
    }

    /// Current price model.
    ///
    /// The artifact is kept in memory and read again only when the file on
    /// disk changes, so a newly trained model is picked up without a
    /// restart. A missing artifact is `Error::ModelNotTrained`.
    pub fn price_model(&self) -> Result<Arc<ModelArtifact>> {
        let Some(stamp) = self.models.stamp()? else {
            *self.model_cache.write() = None;
            return Err(Error::ModelNotTrained);
        };

        if let Some(cached) = self.model_cache.read().as_ref() {
            if cached.stamp == stamp {
                return Ok(cached.artifact.clone());
            }
        }

        let artifact = Arc::new(self.models.load()?.ok_or(Error::ModelNotTrained)?);
        info!("Loaded price model trained at {}", artifact.trained_at);
        *self.model_cache.write() = Some(CachedModel {
            stamp,
            artifact: artifact.clone(),
        });
        Ok(artifact)
    }

    /// Estimate a price with the persisted model
    pub fn predict(&self, features: &PriceFeatures) -> Result<PriceEstimate> {
        features.validate()?;
        let artifact = self.price_model()?;
        estimate_price(&artifact.model, features)
    }
}
