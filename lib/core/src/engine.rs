use tracing::{debug, info, warn};

use crate::listing::{Listing, ListingDocument, ListingTable, GEO_FEATURES, SIMILARITY_FEATURES};
use crate::{FlatIndex, Result, StandardScaler};

/// Number of neighbors returned when the caller does not ask for a count
pub const DEFAULT_K: usize = 5;

/// The loaded table and everything derived from it, built together
#[derive(Debug, Clone)]
struct IndexedListings {
    table: ListingTable,
    scaler: StandardScaler,
    /// Standardized {bedroom, bathroom, price, latitude, longitude}
    similar: FlatIndex,
    /// Raw {latitude, longitude}
    nearby: FlatIndex,
}

/// In-memory property recommendation engine.
///
/// Holds one listing table and two row-aligned nearest-neighbor indexes.
/// The engine is immutable once built; to pick up new listings build a new
/// one and swap it in. An engine built from no usable listings is *empty*
/// and answers every query with an empty result.
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    state: Option<IndexedListings>,
}

impl RecommendationEngine {
    /// An engine with no listings
    pub fn empty() -> Self {
        Self { state: None }
    }

    /// Build from complete listings. Empty input yields an empty engine.
    pub fn build(listings: Vec<Listing>) -> Result<Self> {
        Self::build_from_table(ListingTable::new(listings))
    }

    /// Build both indexes over an existing table. An empty table yields an
    /// empty engine.
    pub fn build_from_table(table: ListingTable) -> Result<Self> {
        if table.is_empty() {
            return Ok(Self::empty());
        }

        let (scaler, scaled) = StandardScaler::fit_transform(&table.similarity_matrix(), SIMILARITY_FEATURES.len())?;
        let similar = FlatIndex::from_matrix(SIMILARITY_FEATURES.len(), scaled)?;
        let nearby = FlatIndex::from_matrix(GEO_FEATURES.len(), table.geo_matrix())?;

        debug_assert_eq!(similar.len(), table.len());
        debug_assert_eq!(nearby.len(), table.len());

        Ok(Self {
            state: Some(IndexedListings {
                table,
                scaler,
                similar,
                nearby,
            }),
        })
    }

    /// Build from raw source documents.
    ///
    /// Documents missing any critical field are dropped. This never fails:
    /// any problem leaves the engine empty and is logged.
    pub fn from_documents(documents: &[ListingDocument]) -> Self {
        if documents.is_empty() {
            warn!("No listings found for recommendations, engine will be empty");
            return Self::empty();
        }

        let (table, dropped) = ListingTable::from_documents(documents);
        if dropped > 0 {
            debug!("Dropped {} listings with missing fields", dropped);
        }
        if table.is_empty() {
            warn!("No valid listings after dropping incomplete records, engine will be empty");
            return Self::empty();
        }

        match Self::build_from_table(table) {
            Ok(engine) => {
                info!("Recommendation engine initialized with {} properties", engine.len());
                engine
            }
            Err(e) => {
                warn!("Error initializing recommendation engine: {}", e);
                Self::empty()
            }
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    /// Number of indexed listings
    #[inline]
    pub fn len(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.table.len())
    }

    /// Rows in the similarity feature matrix
    pub fn similarity_rows(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.similar.len())
    }

    /// Rows in the geo feature matrix
    pub fn geo_rows(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.nearby.len())
    }

    pub fn listing(&self, id: &str) -> Option<&Listing> {
        let state = self.state.as_ref()?;
        state.table.position(id).and_then(|row| state.table.get(row))
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.state.as_ref().map(|s| &s.scaler)
    }

    /// Ids of the `k` listings most similar to `property_id`, nearest first.
    ///
    /// Unknown ids and an empty engine give an empty result. The property
    /// itself is never part of the result.
    pub fn get_similar_properties(&self, property_id: &str, k: usize) -> Vec<String> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        let Some(row) = state.table.position(property_id) else {
            return Vec::new();
        };
        let Some(query) = state.similar.row(row) else {
            return Vec::new();
        };

        // every row carrying the queried id is excluded, not only the query row
        let keep = |r: usize| state.table.get(r).is_some_and(|l| l.id != property_id);
        match state.similar.search_filtered(query, k, keep) {
            Ok(hits) => state.table.ids_at(hits.into_iter().map(|h| h.row)),
            Err(e) => {
                warn!("Similarity query for {} failed: {}", property_id, e);
                Vec::new()
            }
        }
    }

    /// Ids of the `k` listings closest to the textual coordinates, nearest first.
    ///
    /// Coordinates that do not parse as finite numbers give an empty result.
    pub fn get_nearby_properties(&self, lat: &str, lon: &str, k: usize) -> Vec<String> {
        match (parse_coordinate(lat), parse_coordinate(lon)) {
            (Some(lat), Some(lon)) => self.nearby(lat, lon, k),
            _ => Vec::new(),
        }
    }

    /// Ids of the `k` listings closest to `(lat, lon)`.
    ///
    /// Distance is Euclidean on raw degrees, which is only reasonable for a
    /// regional extent.
    pub fn nearby(&self, lat: f64, lon: f64, k: usize) -> Vec<String> {
        let Some(state) = &self.state else {
            return Vec::new();
        };
        if !lat.is_finite() || !lon.is_finite() {
            return Vec::new();
        }

        match state.nearby.search(&[lat, lon], k) {
            Ok(hits) => state.table.ids_at(hits.into_iter().map(|h| h.row)),
            Err(e) => {
                warn!("Nearby query at ({}, {}) failed: {}", lat, lon, e);
                Vec::new()
            }
        }
    }
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
