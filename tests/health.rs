use coupon_service::routes::health::health_check;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
}

#[tokio::test]
async fn health_check_names_the_service() {
    let response = health_check().await;
    let data = response.0.data.expect("health data");
    assert_eq!(data.service, "coupon-service");
}

#[test]
fn health_routes_are_documented_under_health_tag() {
    use coupon_service::routes::doc::ApiDoc;
    use utoipa::OpenApi;

    let doc = ApiDoc::openapi();
    for path in ["/health", "/health/ready"] {
        let operation = doc
            .paths
            .paths
            .get(path)
            .and_then(|item| item.get.as_ref())
            .expect("documented GET operation");
        assert_eq!(operation.tags.as_deref(), Some(&["Health".to_string()][..]));
    }
}
