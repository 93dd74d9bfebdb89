//! # EstateX Core
//!
//! Core library for the EstateX property service.
//!
//! This crate provides the in-memory data structures and algorithms:
//!
//! - [`ListingTable`] - Ordered listings, row position shared by every index
//! - [`StandardScaler`] - Per-column standardization fitted once at build time
//! - [`FlatIndex`] - Exact nearest-neighbor search over contiguous rows
//! - [`RecommendationEngine`] - Similar and nearby property lookups
//! - [`RandomForestRegressor`] - Price model behind [`PricePredictor`]
//!
//! ## Example
//!
//! ```rust
//! use estatex_core::{Listing, RecommendationEngine};
//!
//! let engine = RecommendationEngine::build(vec![
//!     Listing::new("a", 2.0, 1.0, 100_000.0, 40.71, -74.00),
//!     Listing::new("b", 2.0, 1.0, 105_000.0, 40.72, -74.01),
//!     Listing::new("c", 4.0, 3.0, 450_000.0, 40.90, -73.80),
//! ])
//! .unwrap();
//!
//! assert_eq!(engine.get_similar_properties("a", 1), vec!["b".to_string()]);
//! assert_eq!(engine.get_nearby_properties("40.71", "-74.0", 2).len(), 2);
//! ```

pub mod engine;
pub mod error;
pub mod forest;
pub mod index;
pub mod listing;
pub mod predictor;
pub mod scaler;
pub mod vector;

pub use engine::{RecommendationEngine, DEFAULT_K};
pub use error::{Error, Result};
pub use forest::{DecisionTreeRegressor, RandomForestRegressor, TreeParams, MAX_TREE_DEPTH};
pub use index::{FlatIndex, Neighbor};
pub use listing::{Listing, ListingDocument, ListingTable, GEO_FEATURES, SIMILARITY_FEATURES};
pub use predictor::{estimate_price, PriceEstimate, PriceFeatures, PriceModel, PricePredictor, CURRENCY};
pub use scaler::StandardScaler;
