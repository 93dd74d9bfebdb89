//! # EstateX
//!
//! Property recommendations and price estimates over a listings dataset.
//!
//! EstateX loads listing records once, builds two row-aligned
//! nearest-neighbor indexes over them, and answers two kinds of query:
//!
//! - **Similar**: listings closest to a given listing in standardized
//!   {bedroom, bathroom, price, latitude, longitude} space
//! - **Nearby**: listings closest to a coordinate pair
//!
//! A random forest trained offline estimates prices from
//! {bedroom, bathroom, latitude, longitude}.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! DATABASE_URL=./data/listings.json estatex train
//! DATABASE_URL=./data/listings.json estatex serve --http-port 5000
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use estatex::prelude::*;
//!
//! let engine = RecommendationEngine::build(vec![
//!     Listing::new("a", 2.0, 1.0, 100_000.0, 40.71, -74.00),
//!     Listing::new("b", 3.0, 2.0, 180_000.0, 40.73, -73.99),
//! ])
//! .unwrap();
//!
//! let similar = engine.get_similar_properties("a", 5);
//! assert_eq!(similar, vec!["b".to_string()]);
//! ```
//!
//! ## Crate Structure
//!
//! - `estatex-core` - Listing table, scaler, flat k-NN index, engine, forest
//! - `estatex-storage` - Listing sources, model store, training, engine manager
//! - `estatex-api` - REST API

// Re-export core types
pub use estatex_core::{
    estimate_price, Error, FlatIndex, Listing, ListingDocument, ListingTable, PriceEstimate,
    PriceFeatures, PriceModel, PricePredictor, RandomForestRegressor, RecommendationEngine,
    Result, StandardScaler, DEFAULT_K,
};

// Re-export storage
pub use estatex_storage::{
    DataSource, EngineManager, FileSource, HttpSource, ListingSource, MemorySource, ModelArtifact,
    ModelStore, TrainingConfig, TrainingReport,
};

// Re-export API
pub use estatex_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DataSource, EngineManager, Error, Listing, ListingDocument, ListingSource, ModelStore,
        PriceFeatures, PricePredictor, RecommendationEngine, Result, RestApi, DEFAULT_K,
    };
}
