use ahash::AHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::predictor::PriceFeatures;

/// Column order of the similarity feature matrix
pub const SIMILARITY_FEATURES: [&str; 5] = ["bedroom", "bathroom", "price", "latitude", "longitude"];

/// Column order of the geo feature matrix
pub const GEO_FEATURES: [&str; 2] = ["latitude", "longitude"];

/// A listing with every critical field present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub bedroom: f64,
    pub bathroom: f64,
    pub price: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl Listing {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        bedroom: f64,
        bathroom: f64,
        price: f64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            bedroom,
            bathroom,
            price,
            latitude,
            longitude,
        }
    }

    /// Projection in `SIMILARITY_FEATURES` order
    #[inline]
    pub fn similarity_features(&self) -> [f64; 5] {
        [self.bedroom, self.bathroom, self.price, self.latitude, self.longitude]
    }

    /// Projection in `GEO_FEATURES` order
    #[inline]
    pub fn geo_features(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

/// A listing record as delivered by a listing source.
///
/// Every field is optional: documents come from a schemaless store and may
/// carry nulls, extended-JSON number wrappers (`{"$numberDouble": "1.5"}`)
/// or an ObjectId (`{"$oid": "..."}`) as identifier.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListingDocument {
    #[serde(rename = "_id", alias = "id", default, deserialize_with = "de_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de_number")]
    pub bedroom: Option<f64>,
    #[serde(default, deserialize_with = "de_number")]
    pub bathroom: Option<f64>,
    #[serde(default, deserialize_with = "de_number")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de_number")]
    pub longitude: Option<f64>,
}

impl ListingDocument {
    /// Returns `None` when the id or any critical field is missing
    pub fn to_listing(&self) -> Option<Listing> {
        Some(Listing {
            id: self.id.clone()?,
            bedroom: self.bedroom?,
            bathroom: self.bathroom?,
            price: self.price?,
            latitude: self.latitude?,
            longitude: self.longitude?,
        })
    }

    /// Training sample for the price model. The id is not required here.
    pub fn price_sample(&self) -> Option<(PriceFeatures, f64)> {
        let features = PriceFeatures {
            bedroom: self.bedroom?,
            bathroom: self.bathroom?,
            latitude: self.latitude?,
            longitude: self.longitude?,
        };
        Some((features, self.price?))
    }
}

impl From<Listing> for ListingDocument {
    fn from(listing: Listing) -> Self {
        Self {
            id: Some(listing.id),
            price: Some(listing.price),
            bedroom: Some(listing.bedroom),
            bathroom: Some(listing.bathroom),
            latitude: Some(listing.latitude),
            longitude: Some(listing.longitude),
        }
    }
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(id_from_value(&value))
}

fn de_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value))
}

/// String form of a document identifier
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("$oid").and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}

/// Finite numeric value of a field, `None` when missing or unusable
pub fn number_from_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(obj) => ["$numberDouble", "$numberInt", "$numberLong", "$numberDecimal"]
            .iter()
            .find_map(|key| obj.get(*key))
            .and_then(|v| match v {
                Value::String(s) => s.trim().parse::<f64>().ok(),
                Value::Number(n) => n.as_f64(),
                _ => None,
            }),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Ordered, immutable table of listings.
///
/// Row position is the identity shared by every derived matrix and index.
#[derive(Debug, Clone, Default)]
pub struct ListingTable {
    rows: Vec<Listing>,
    row_by_id: AHashMap<String, usize>,
}

impl ListingTable {
    pub fn new(rows: Vec<Listing>) -> Self {
        let mut row_by_id = AHashMap::with_capacity(rows.len());
        for (row, listing) in rows.iter().enumerate() {
            // first occurrence wins for duplicated ids
            row_by_id.entry(listing.id.clone()).or_insert(row);
        }
        Self { rows, row_by_id }
    }

    /// Builds a table from raw documents, dropping incomplete ones.
    /// Returns the table and the number of dropped documents.
    pub fn from_documents(documents: &[ListingDocument]) -> (Self, usize) {
        let rows: Vec<Listing> = documents.iter().filter_map(ListingDocument::to_listing).collect();
        let dropped = documents.len() - rows.len();
        (Self::new(rows), dropped)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize) -> Option<&Listing> {
        self.rows.get(row)
    }

    /// Row of the first listing with this id
    #[inline]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.row_by_id.get(id).copied()
    }

    pub fn ids_at(&self, rows: impl IntoIterator<Item = usize>) -> Vec<String> {
        rows.into_iter()
            .filter_map(|row| self.rows.get(row).map(|l| l.id.clone()))
            .collect()
    }

    /// Row-major similarity feature matrix (unscaled)
    pub fn similarity_matrix(&self) -> Vec<f64> {
        self.rows.iter().flat_map(Listing::similarity_features).collect()
    }

    /// Row-major geo feature matrix
    pub fn geo_matrix(&self) -> Vec<f64> {
        self.rows.iter().flat_map(Listing::geo_features).collect()
    }
}
