use actix_web::{test, web, App};
use chrono::DateTime;
use gatehouse::{routes, AppState, Settings};

#[actix_web::test]
async fn test_health_check() {
    // Create test app state
    let config = Settings::new_for_test().expect("Failed to load test config");
    let routes_config = config.routes.clone();
    let (state, _store) = AppState::in_memory(config);

    // Create test app
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(move |cfg| routes::configure(cfg, &routes_config)),
    )
    .await;

    // Send request
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    // Assert response
    assert!(resp.status().is_success());

    // Parse response body
    let body = test::read_body(resp).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // Verify response format
    assert_eq!(json["status"], "healthy");
    assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}
