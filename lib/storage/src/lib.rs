//! # EstateX Storage
//!
//! Everything around the core engine that touches the outside world:
//! listing sources, the persisted price model, the training pipeline and the
//! shared [`EngineManager`].

pub mod manager;
pub mod model_store;
pub mod source;
pub mod training;

pub use manager::{load_engine, EngineManager};
pub use model_store::{ModelArtifact, ModelStamp, ModelStore, DEFAULT_MODEL_PATH};
pub use source::{DataSource, FileSource, HttpSource, ListingSource, MemorySource};
pub use training::{train_price_model, TrainingConfig, TrainingReport};
