use actix_cors::Cors;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use estatex_core::{Error, PriceFeatures, DEFAULT_K};
use estatex_storage::EngineManager;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Deserialize)]
struct SimilarQuery {
    k: Option<usize>,
}

#[derive(Deserialize)]
struct NearbyQuery {
    lat: Option<String>,
    lng: Option<String>,
    k: Option<usize>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(manager: Arc<EngineManager>, host: &str, port: u16) -> std::io::Result<()> {
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(manager.clone()))
                .configure(configure)
        })
        .bind((host, port))?
        .run()
        .await
    }
}

/// Mount every route on an app
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/predict", web::post().to(predict))
        .route("/recommend/similar/{property_id}", web::get().to(similar_properties))
        .route("/recommend/nearby", web::get().to(nearby_properties))
        .route("/health", web::get().to(health));
}

fn error_response(status: actix_web::http::StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "error": message.into()
    }))
}

/// Pull the four model inputs out of a JSON body
fn parse_features(body: &[u8]) -> Result<PriceFeatures, String> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| format!("Invalid JSON body: {}", e))?;
    let obj = value.as_object().ok_or_else(|| "Request body must be a JSON object".to_string())?;

    let field = |name: &str| -> Result<f64, String> {
        obj.get(name)
            .and_then(estatex_core::listing::number_from_value)
            .ok_or_else(|| format!("Missing or invalid field: {}", name))
    };

    Ok(PriceFeatures {
        bedroom: field("bedroom")?,
        bathroom: field("bathroom")?,
        latitude: field("latitude")?,
        longitude: field("longitude")?,
    })
}

async fn predict(manager: web::Data<Arc<EngineManager>>, body: web::Bytes) -> ActixResult<HttpResponse> {
    let features = match parse_features(&body) {
        Ok(features) => features,
        Err(message) => return Ok(error_response(actix_web::http::StatusCode::BAD_REQUEST, message)),
    };
    debug!("Received prediction request: {:?}", features);

    // model file checks and a possible reload run off the worker thread
    let manager = manager.into_inner();
    let result = match web::block(move || manager.predict(&features)).await {
        Ok(result) => result,
        Err(e) => {
            error!("Prediction task failed: {}", e);
            return Ok(error_response(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    match result {
        Ok(estimate) => Ok(HttpResponse::Ok().json(estimate)),
        Err(Error::ModelNotTrained) => Ok(error_response(
            actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
            "Model not trained yet",
        )),
        Err(e) if e.is_client_error() => Ok(error_response(actix_web::http::StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => {
            error!("Prediction failed: {}", e);
            Ok(error_response(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn similar_properties(
    manager: web::Data<Arc<EngineManager>>,
    path: web::Path<String>,
    query: web::Query<SimilarQuery>,
) -> ActixResult<HttpResponse> {
    let property_id = path.into_inner();
    let k = query.k.unwrap_or(DEFAULT_K);

    let similar = manager.engine().get_similar_properties(&property_id, k);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "similar_properties": similar
    })))
}

async fn nearby_properties(
    manager: web::Data<Arc<EngineManager>>,
    query: web::Query<NearbyQuery>,
) -> ActixResult<HttpResponse> {
    let (Some(lat), Some(lng)) = (query.lat.as_deref(), query.lng.as_deref()) else {
        return Ok(error_response(
            actix_web::http::StatusCode::BAD_REQUEST,
            "Both 'lat' and 'lng' query parameters are required",
        ));
    };
    let k = query.k.unwrap_or(DEFAULT_K);

    let nearby = manager.engine().get_nearby_properties(lat, lng, k);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "nearby_properties": nearby
    })))
}

async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use estatex_core::{Listing, PriceModel, RandomForestRegressor, RecommendationEngine};
    use estatex_storage::{ModelArtifact, ModelStore};

    fn engine() -> RecommendationEngine {
        RecommendationEngine::build(vec![
            Listing::new("A", 2.0, 1.0, 100_000.0, 0.0, 0.0),
            Listing::new("B", 2.0, 1.0, 110_000.0, 0.1, 0.1),
            Listing::new("C", 3.0, 2.0, 250_000.0, 1.0, 1.0),
        ])
        .unwrap()
    }

    fn manager(dir: &tempfile::TempDir) -> Arc<EngineManager> {
        Arc::new(EngineManager::new(engine(), ModelStore::new(dir.path().join("price_model.bin"))))
    }

    macro_rules! app {
        ($manager:expr) => {
            test::init_service(App::new().app_data(web::Data::new($manager)).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(manager(&dir));
        let resp: serde_json::Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp, serde_json::json!({"status": "healthy"}));
    }

    #[actix_web::test]
    async fn test_similar_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(manager(&dir));

        let req = test::TestRequest::get().uri("/recommend/similar/A?k=1").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, serde_json::json!({"similar_properties": ["B"]}));

        let req = test::TestRequest::get().uri("/recommend/similar/unknown").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, serde_json::json!({"similar_properties": []}));
    }

    #[actix_web::test]
    async fn test_nearby_route() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(manager(&dir));

        let req = test::TestRequest::get().uri("/recommend/nearby?lat=1.0&lng=2.0").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["nearby_properties"].as_array().map(Vec::len), Some(3));

        let req = test::TestRequest::get().uri("/recommend/nearby?lat=0&lng=0&k=1").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, serde_json::json!({"nearby_properties": ["A"]}));

        let req = test::TestRequest::get().uri("/recommend/nearby?lat=abc&lng=2.0").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp, serde_json::json!({"nearby_properties": []}));
    }

    #[actix_web::test]
    async fn test_huge_k_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(manager(&dir));

        let req = test::TestRequest::get().uri("/recommend/similar/A?k=1000000000000").to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["similar_properties"].as_array().map(Vec::len), Some(2));

        let uri = format!("/recommend/nearby?lat=0&lng=0&k={}", usize::MAX);
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["nearby_properties"].as_array().map(Vec::len), Some(3));
    }

    #[actix_web::test]
    async fn test_nearby_missing_parameter() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(manager(&dir));

        let req = test::TestRequest::get().uri("/recommend/nearby?lat=1.0").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body.get("error").is_some());
    }

    #[actix_web::test]
    async fn test_predict_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(manager(&dir));

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(serde_json::json!({"bedroom": 2, "bathroom": 1, "latitude": 0.0, "longitude": 0.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Model not trained yet");
    }

    #[actix_web::test]
    async fn test_predict_malformed_body() {
        let dir = tempfile::tempdir().unwrap();
        let app = app!(manager(&dir));

        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(serde_json::json!({"bedroom": 2, "bathroom": "many"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post().uri("/predict").set_payload("not json").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_predict_with_trained_model() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);

        let mut forest = RandomForestRegressor::new(5);
        forest
            .fit(&[2.0, 1.0, 0.0, 0.0, 2.0, 1.0, 0.1, 0.1], &[123_456.789, 123_456.789], 4)
            .unwrap();
        manager
            .models()
            .save(&ModelArtifact::new(PriceModel::new(forest, 2, None)))
            .unwrap();

        let app = app!(manager);
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(serde_json::json!({"bedroom": 2, "bathroom": 1, "latitude": 0.05, "longitude": 0.05}))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["currency"], "USD");
        assert_eq!(resp["estimated_price"].as_f64(), Some(123_456.79));
    }
}
