/// End-to-end tests: listings -> artifacts on disk -> predictor -> HTTP.
///
/// Run with: cargo test --test integration_tests -- --nocapture

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use std::sync::Arc;
use tower::ServiceExt;

use car_price::{
    artifacts::{save_bundle, ArtifactPaths, Artifacts},
    builder::{build, BuildOptions},
    dataset::read_listings,
    depreciation::current_year,
    encoder::InferenceEncoder,
    schema::Dimension,
    server,
    types::RawListing,
    AppConfig, PredictionQuery, PriceError, PricePredictor,
};

fn listing(i: usize, title: &str, price: i64, description: String) -> RawListing {
    RawListing {
        url: format!("https://www.sauto.cz/osobni/detail/{}", i),
        title: title.to_string(),
        raw_price: format!("{} Kč", price),
        description,
    }
}

fn market() -> Vec<RawListing> {
    let mut out = Vec::new();
    let mut i = 0;
    for k in 0..12i64 {
        let year = 2012 + (k % 10) as i32;
        let km = 200_000 - k * 12_000;
        let fuel = if k % 2 == 0 { "Benzín" } else { "Nafta" };
        out.push(listing(
            i,
            "BMW 320d xDrive",
            600_000 + k * 40_000,
            format!("{}, {} km, {}, Automatická", year, km, fuel),
        ));
        i += 1;
        out.push(listing(
            i,
            "Škoda Octavia Combi",
            250_000 + k * 25_000,
            format!("{}, {} km, {}, Manuální", year, km, fuel),
        ));
        i += 1;
    }
    for k in 0..6i64 {
        out.push(listing(
            i,
            "AUDI A6 Avant",
            500_000 + k * 50_000,
            format!("{}, {} km, Nafta{}", 2015 + k as i32, 180_000 - k * 20_000,
                if k % 2 == 0 { ", Automatická" } else { "" }),
        ));
        i += 1;
    }
    // Noise that cleaning must drop.
    out.push(listing(i, "BMW X5", 0, "2020, 10 000 km, Nafta".into()));
    out.push(listing(i + 1, "Škoda Fabia", 150_000, "bez roku, 10 000 km".into()));
    out
}

fn config_in(dir: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.paths.model_dir = dir.to_path_buf();
    cfg
}

fn trained(dir: &std::path::Path) -> AppConfig {
    let cfg = config_in(dir);
    let bundle = build(&market(), &BuildOptions::from_config(&cfg.model)).unwrap();
    save_bundle(&bundle, &ArtifactPaths::from_config(&cfg.paths)).unwrap();
    cfg
}

#[test]
fn test_end_to_end_vector_and_prediction() {
    println!("\n=== Test: End-to-End Encoding ===");
    let dir = tempfile::tempdir().unwrap();
    let cfg = trained(dir.path());

    let artifacts = Artifacts::load(&ArtifactPaths::from_config(&cfg.paths)).unwrap();
    let schema = Arc::clone(&artifacts.schema);
    assert!(schema.contains("brand_BMW"));
    assert!(schema.contains("fuel_Benzín"));
    assert!(schema.contains("transmission_Automatická"));

    let encoder = InferenceEncoder::new(Arc::clone(&schema), cfg.model.label_mappings());
    let query = PredictionQuery::new(2020, 50_000, "BMW", "Petrol", "Automatic");
    let encoding = encoder.encode(&query);

    let keys: Vec<&str> = encoding.vector.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, schema.columns());
    for (name, value) in encoding.vector.iter() {
        let expected = match name {
            "year" => 2020.0,
            "mileage" => 50_000.0,
            "brand_BMW" | "fuel_Benzín" | "transmission_Automatická" => 1.0,
            _ => 0.0,
        };
        assert_eq!(value, expected, "column {}", name);
    }
    println!("✓ vector has exactly the expected indicators");

    let predictor = PricePredictor::new(artifacts, &cfg);
    let a = predictor.predict(&query).unwrap();
    let b = predictor.predict_price(2020, 50_000, "BMW", "Petrol", "Automatic").unwrap();
    assert_eq!(a, b);
    assert!(a.is_finite());
    println!("✓ deterministic prediction: {:.0}", a);
}

#[test]
fn test_brands_and_metadata_from_training() {
    println!("\n=== Test: Brands and Metadata ===");
    let dir = tempfile::tempdir().unwrap();
    let cfg = trained(dir.path());
    let predictor = PricePredictor::from_config(&cfg).unwrap();

    assert_eq!(predictor.get_clean_brands(), vec!["Audi", "BMW", "Škoda"]);
    assert!(predictor.validates());

    // Škoda was only ever listed with a manual gearbox.
    let err = predictor
        .predict_price(2019, 80_000, "škoda", "Diesel", "Automatic")
        .unwrap_err();
    match err {
        PriceError::ValidationRejected(e) => {
            let msg = e.to_string();
            assert!(msg.contains("Available: Manuální"), "{}", msg);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(predictor.predict_price(2019, 80_000, "škoda", "Diesel", "Manual").is_ok());
    println!("✓ registry enforces observed combinations");
}

#[test]
fn test_unknown_brand_still_predicts_without_registry() {
    println!("\n=== Test: Unknown Brand Baseline ===");
    let dir = tempfile::tempdir().unwrap();
    let cfg = trained(dir.path());
    std::fs::remove_file(ArtifactPaths::from_config(&cfg.paths).metadata).unwrap();

    let predictor = PricePredictor::from_config(&cfg).unwrap();
    assert!(!predictor.validates());

    let encoder = InferenceEncoder::new(
        Arc::new(predictor.schema().clone()),
        cfg.model.label_mappings(),
    );
    let encoding = encoder.encode(&PredictionQuery::new(2018, 90_000, "Dacia", "Petrol", "Manual"));
    assert_eq!(encoding.vector.active(Dimension::Brand), 0);
    assert_eq!(encoding.vector.as_slice().len(), predictor.schema().len());

    let price = predictor.predict_price(2018, 90_000, "Dacia", "Petrol", "Manual").unwrap();
    assert!(price.is_finite());
    println!("✓ baseline prediction {:.0}", price);
}

#[test]
fn test_csv_to_artifacts() {
    let csv = "url,title,raw_price,description\n\
u1,BMW 530d,\"900 000 Kč\",\"2019, 90 000 km, Nafta, Automatická\"\n\
u2,BMW 520i,\"800 000 Kč\",\"2018, 110 000 km, Benzín, Automatická\"\n\
u2,BMW 520i,\"800 000 Kč\",\"2018, 110 000 km, Benzín, Automatická\"\n\
u3,Kia Ceed,\"300 000 Kč\",\"2017, 120 000 km, Benzín\"\n";
    let listings = read_listings(csv.as_bytes()).unwrap();
    assert_eq!(listings.len(), 3);

    let bundle = build(&listings, &BuildOptions::default()).unwrap();
    assert_eq!(bundle.report.retained, 3);
    assert_eq!(
        bundle.schema.columns(),
        &[
            "year",
            "mileage",
            "brand_BMW",
            "brand_Kia",
            "fuel_Benzín",
            "fuel_Nafta",
            "transmission_Automatická",
            "transmission_Manuální",
        ]
    );
}

#[test]
fn test_forecast_follows_predicted_price() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = trained(dir.path());
    let predictor = PricePredictor::from_config(&cfg).unwrap();

    let q = PredictionQuery::new(2021, 40_000, "Audi", "Diesel", "Automatic");
    let est = predictor.estimate(&q, None, None).unwrap();
    assert_eq!(est.forecast.len(), 6);
    assert_eq!(est.forecast[0].year, current_year());
    for (k, point) in est.forecast.iter().enumerate() {
        assert_eq!(point.price, est.price * (1.0f64 - 0.10).powi(k as i32));
    }
}

// ---------- HTTP ----------

async fn call(app: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_http_routes() {
    println!("\n=== Test: HTTP Routes ===");
    let dir = tempfile::tempdir().unwrap();
    let cfg = trained(dir.path());
    let app = server::router(Arc::new(PricePredictor::from_config(&cfg).unwrap()));

    let (status, body) = call(
        app.clone(),
        Request::builder().uri("/brands").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["Audi", "BMW", "Škoda"]));

    let (status, body) = call(
        app.clone(),
        post(
            "/predict",
            serde_json::json!({
                "year": 2020, "mileage": 50000, "brand": "BMW",
                "fuel": "Petrol", "transmission": "Automatic", "years": 3
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["price"].is_number());
    assert_eq!(body["forecast"].as_array().unwrap().len(), 4);

    let (status, body) = call(
        app.clone(),
        post(
            "/predict",
            serde_json::json!({
                "year": 2020, "mileage": 50000, "brand": "Trabant",
                "fuel": "Petrol", "transmission": "Manual"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Trabant"));

    let (status, _) = call(
        app.clone(),
        post(
            "/predict",
            serde_json::json!({
                "year": 1950, "mileage": 50000, "brand": "BMW",
                "fuel": "Petrol", "transmission": "Automatic"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        app.clone(),
        post("/forecast", serde_json::json!({ "price": 1000.0, "years": 2, "rate": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[2]["price"], serde_json::json!(250.0));

    let (status, body) = call(
        app.clone(),
        post("/forecast", serde_json::json!({ "price": 1000.0, "years": 4294967295u32 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("horizon"));

    let (status, _) = call(
        app,
        post(
            "/predict",
            serde_json::json!({
                "year": 2020, "mileage": 50000, "brand": "BMW",
                "fuel": "Petrol", "transmission": "Automatic", "years": 4294967295u32
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    println!("✓ routes respond with expected status codes");
}
