use serde::{Deserialize, Serialize};

use crate::{Error, RandomForestRegressor, Result};

/// Currency reported alongside every estimate
pub const CURRENCY: &str = "USD";

/// Inputs of the price model, in column order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceFeatures {
    pub bedroom: f64,
    pub bathroom: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl PriceFeatures {
    pub const NAMES: [&'static str; 4] = ["bedroom", "bathroom", "latitude", "longitude"];

    #[inline]
    pub fn to_row(&self) -> [f64; 4] {
        [self.bedroom, self.bathroom, self.latitude, self.longitude]
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in Self::NAMES.iter().zip(self.to_row()) {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!("{} must be a finite number", name)));
            }
        }
        Ok(())
    }
}

/// Anything that can turn listing features into a price
pub trait PricePredictor {
    fn predict(&self, features: &PriceFeatures) -> Result<f64>;
}

/// Trained price model as persisted by the model store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceModel {
    pub forest: RandomForestRegressor,
    pub feature_names: Vec<String>,
    /// Mean absolute error on the hold-out split, if one was evaluated
    pub mae: Option<f64>,
    pub train_size: usize,
}

impl PriceModel {
    pub fn new(forest: RandomForestRegressor, train_size: usize, mae: Option<f64>) -> Self {
        Self {
            forest,
            feature_names: PriceFeatures::NAMES.iter().map(|s| s.to_string()).collect(),
            mae,
            train_size,
        }
    }
}

impl PricePredictor for PriceModel {
    fn predict(&self, features: &PriceFeatures) -> Result<f64> {
        features.validate()?;
        self.forest.predict_row(&features.to_row())
    }
}

/// Price estimate as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceEstimate {
    pub estimated_price: f64,
    pub currency: &'static str,
}

/// Predict and round to cents
pub fn estimate_price<P: PricePredictor + ?Sized>(predictor: &P, features: &PriceFeatures) -> Result<PriceEstimate> {
    let price = predictor.predict(features)?;
    Ok(PriceEstimate {
        estimated_price: round_cents(price),
        currency: CURRENCY,
    })
}

#[inline]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    impl PricePredictor for Fixed {
        fn predict(&self, _features: &PriceFeatures) -> Result<f64> {
            Ok(self.0)
        }
    }

    fn features() -> PriceFeatures {
        PriceFeatures {
            bedroom: 2.0,
            bathroom: 1.0,
            latitude: 40.0,
            longitude: -73.0,
        }
    }

    #[test]
    fn test_estimate_rounds_to_cents() {
        let estimate = estimate_price(&Fixed(123_456.789), &features()).unwrap();
        assert_eq!(estimate.estimated_price, 123_456.79);
        assert_eq!(estimate.currency, "USD");
    }

    #[test]
    fn test_unfitted_model_is_not_trained() {
        let model = PriceModel::new(RandomForestRegressor::new(10), 0, None);
        assert!(matches!(model.predict(&features()), Err(Error::ModelNotTrained)));
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let mut forest = RandomForestRegressor::new(2);
        forest.fit(&[1.0, 1.0, 0.0, 0.0], &[10.0], 4).unwrap();
        let model = PriceModel::new(forest, 1, None);

        let mut bad = features();
        bad.latitude = f64::NAN;
        let err = model.predict(&bad).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(model.predict(&features()).unwrap(), 10.0);
    }
}
