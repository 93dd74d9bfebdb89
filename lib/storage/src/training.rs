use chrono::{DateTime, Utc};
use estatex_core::{Error, PriceFeatures, PriceModel, RandomForestRegressor, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::info;

use crate::model_store::{ModelArtifact, ModelStore};
use crate::source::ListingSource;

/// Training run settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub n_estimators: usize,
    /// Fraction of samples held out for evaluation
    pub test_size: f64,
    pub seed: u64,
    /// Depth limit per tree, never above `MAX_TREE_DEPTH`
    pub max_depth: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            test_size: 0.1,
            seed: 42,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub dropped: usize,
    pub train_size: usize,
    pub test_size: usize,
    /// Mean absolute error on the hold-out split, `None` when it is empty
    pub mae: Option<f64>,
    pub trained_at: DateTime<Utc>,
}

/// Shuffle row indices with a seeded RNG and split them into train and test.
///
/// The test side gets `ceil(n * test_size)` rows but never all of them.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_size) {
        return Err(Error::InvalidConfig(format!(
            "test_size must be in [0, 1), got {}",
            test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_size).ceil() as usize).min(n.saturating_sub(1));
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let total: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    Some(total / actual.len() as f64)
}

/// Fit a price model on samples and evaluate it on a hold-out split
pub fn fit_price_model(samples: &[(PriceFeatures, f64)], config: &TrainingConfig) -> Result<(PriceModel, usize, Option<f64>)> {
    if samples.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let (train_idx, test_idx) = train_test_split(samples.len(), config.test_size, config.seed)?;
    let dim = PriceFeatures::NAMES.len();

    let x_train: Vec<f64> = train_idx.iter().flat_map(|&i| samples[i].0.to_row()).collect();
    let y_train: Vec<f64> = train_idx.iter().map(|&i| samples[i].1).collect();

    let mut forest = RandomForestRegressor::new(config.n_estimators).with_seed(config.seed);
    if let Some(max_depth) = config.max_depth {
        forest = forest.with_max_depth(max_depth);
    }
    forest.fit(&x_train, &y_train, dim)?;

    let mae = if test_idx.is_empty() {
        None
    } else {
        let x_test: Vec<f64> = test_idx.iter().flat_map(|&i| samples[i].0.to_row()).collect();
        let y_test: Vec<f64> = test_idx.iter().map(|&i| samples[i].1).collect();
        mean_absolute_error(&y_test, &forest.predict(&x_test)?)
    };

    Ok((PriceModel::new(forest, train_idx.len(), mae), test_idx.len(), mae))
}

/// Fetch listings, train a price model and persist it
pub async fn train_price_model<S: ListingSource>(
    source: &S,
    store: &ModelStore,
    config: &TrainingConfig,
) -> Result<TrainingReport> {
    info!("Fetching listings for training...");
    let documents = source.fetch_listings().await?;
    if documents.is_empty() {
        return Err(Error::EmptyDataset);
    }
    info!("Found {} records", documents.len());

    let samples: Vec<(PriceFeatures, f64)> = documents.iter().filter_map(|d| d.price_sample()).collect();
    let dropped = documents.len() - samples.len();

    info!("Training random forest regressor with {} trees...", config.n_estimators);
    let (model, test_size, mae) = fit_price_model(&samples, config)?;
    match mae {
        Some(mae) => info!("Model trained. MAE: {:.2}", mae),
        None => info!("Model trained without a hold-out split"),
    }

    let train_size = model.train_size;
    let artifact = ModelArtifact::new(model);
    store.save(&artifact)?;

    Ok(TrainingReport {
        samples: samples.len(),
        dropped,
        train_size,
        test_size,
        mae,
        trained_at: artifact.trained_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use estatex_core::{Listing, ListingDocument, PricePredictor};

    fn documents(n: usize) -> Vec<ListingDocument> {
        (0..n)
            .map(|i| {
                let bed = (i % 4 + 1) as f64;
                ListingDocument::from(Listing::new(
                    format!("p{}", i),
                    bed,
                    (i % 2 + 1) as f64,
                    bed * 100_000.0,
                    40.0 + (i % 7) as f64 * 0.01,
                    -74.0 + (i % 5) as f64 * 0.01,
                ))
            })
            .collect()
    }

    #[test]
    fn test_split_sizes_and_disjoint() {
        let (train, test) = train_test_split(20, 0.1, 42).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 18);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());

        let (train_again, _) = train_test_split(20, 0.1, 42).unwrap();
        assert_eq!(train, train_again);
    }

    #[test]
    fn test_split_never_empties_train() {
        let (train, test) = train_test_split(1, 0.5, 0).unwrap();
        assert_eq!(train.len(), 1);
        assert!(test.is_empty());
        assert!(train_test_split(10, 1.0, 0).is_err());
    }

    #[test]
    fn test_mean_absolute_error() {
        assert_eq!(mean_absolute_error(&[1.0, 2.0, 3.0], &[2.0, 2.0, 1.0]), Some(1.0));
        assert_eq!(mean_absolute_error(&[], &[]), None);
    }

    #[tokio::test]
    async fn test_train_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("models/price_model.bin"));

        let mut docs = documents(40);
        docs.push(ListingDocument {
            price: Some(1.0),
            ..Default::default()
        });
        let source = MemorySource::new(docs);
        let config = TrainingConfig {
            n_estimators: 10,
            ..TrainingConfig::default()
        };

        let report = train_price_model(&source, &store, &config).await.unwrap();
        assert_eq!(report.samples, 40);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.test_size, 4);
        assert_eq!(report.train_size, 36);
        assert!(report.mae.is_some());

        let artifact = store.load().unwrap().unwrap();
        let estimate = artifact
            .model
            .predict(&PriceFeatures {
                bedroom: 2.0,
                bathroom: 1.0,
                latitude: 40.02,
                longitude: -73.98,
            })
            .unwrap();
        assert!(estimate > 0.0);
    }

    #[test]
    fn test_fit_honors_max_depth() {
        let samples: Vec<(PriceFeatures, f64)> = documents(30).iter().filter_map(|d| d.price_sample()).collect();
        let config = TrainingConfig {
            n_estimators: 4,
            max_depth: Some(1),
            ..TrainingConfig::default()
        };
        let (model, _, _) = fit_price_model(&samples, &config).unwrap();
        assert!(model.forest.trees().iter().all(|tree| tree.depth() <= 1));
    }

    #[tokio::test]
    async fn test_train_empty_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("price_model.bin"));
        let result = train_price_model(&MemorySource::default(), &store, &TrainingConfig::default()).await;
        assert!(matches!(result, Err(Error::EmptyDataset)));
        assert!(!store.exists());
    }
}
