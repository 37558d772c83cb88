//! Component tests: proxying, breaker behavior and error envelopes against
//! a local upstream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App, HttpResponse, HttpServer};
use api_gateway::config::RouteConfig;
use api_gateway::proxy::{self, GatewayState};
use api_gateway::routes::RouteTable;
use dashmap::DashMap;
use resilience::{CircuitBreaker, CircuitBreakerConfig};

struct UpstreamBehavior {
    /// Number of leading requests answered with 500
    failures: usize,
    calls: AtomicUsize,
}

async fn upstream_handler(behavior: web::Data<Arc<UpstreamBehavior>>) -> HttpResponse {
    let call = behavior.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if call <= behavior.failures {
        HttpResponse::InternalServerError().body("upstream boom")
    } else {
        HttpResponse::Ok()
            .insert_header(("x-upstream", "true"))
            .body("upstream ok")
    }
}

/// Spawn a real upstream on a random port.
async fn spawn_upstream(failures: usize) -> (String, Arc<UpstreamBehavior>) {
    let behavior = Arc::new(UpstreamBehavior {
        failures,
        calls: AtomicUsize::new(0),
    });

    let data = behavior.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(data.clone()))
            .default_service(web::route().to(upstream_handler))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("failed to bind upstream");

    let addr = server.addrs()[0];
    tokio::spawn(server.run());

    (format!("http://{addr}"), behavior)
}

fn gateway_state(upstream: String, fail_max: u32, reset_timeout: Duration) -> GatewayState {
    let route = RouteConfig {
        name: "offering".to_string(),
        prefix: "/api/v1/offerings".to_string(),
        upstream,
    };

    let breakers = DashMap::new();
    breakers.insert(
        route.name.clone(),
        Arc::new(CircuitBreaker::new(
            route.name.clone(),
            CircuitBreakerConfig {
                fail_max,
                reset_timeout,
            },
        )),
    );

    GatewayState {
        client: reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap(),
        routes: RouteTable::new(vec![route]),
        breakers,
    }
}

#[actix_web::test]
async fn forwards_upstream_responses() {
    let (upstream, behavior) = spawn_upstream(0).await;
    let state = web::Data::new(gateway_state(upstream, 3, Duration::from_secs(30)));

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .default_service(web::route().to(proxy::proxy)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/offerings/abc")
        .to_request();
    let res = test::call_service(&app, req).await;

    assert!(res.status().is_success());
    assert_eq!(res.headers().get("x-upstream").unwrap(), "true");
    let body = test::read_body(res).await;
    assert_eq!(body, "upstream ok");
    assert_eq!(behavior.calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn breaker_opens_after_consecutive_failures_and_recovers() {
    // 3 failing responses, then healthy.
    let (upstream, behavior) = spawn_upstream(3).await;
    let state = web::Data::new(gateway_state(upstream, 3, Duration::from_millis(200)));

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .default_service(web::route().to(proxy::proxy)),
    )
    .await;

    // Three upstream 5xx responses pass through and trip the breaker.
    for _ in 0..3 {
        let req = test::TestRequest::get()
            .uri("/api/v1/offerings/abc")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status().as_u16(), 500);
    }
    assert_eq!(behavior.calls.load(Ordering::SeqCst), 3);

    // Fourth call short-circuits: 503 envelope, upstream not contacted.
    let req = test::TestRequest::get()
        .uri("/api/v1/offerings/abc")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 503);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    assert!(body["error"]["correlation_id"].is_string());
    assert_eq!(behavior.calls.load(Ordering::SeqCst), 3);

    // After the reset timeout a single probe goes through and closes the
    // circuit; traffic flows again.
    tokio::time::sleep(Duration::from_millis(250)).await;

    let req = test::TestRequest::get()
        .uri("/api/v1/offerings/abc")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    assert_eq!(behavior.calls.load(Ordering::SeqCst), 4);

    let req = test::TestRequest::get()
        .uri("/api/v1/offerings/abc")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
}

#[actix_web::test]
async fn unknown_route_is_not_found() {
    let (upstream, _) = spawn_upstream(0).await;
    let state = web::Data::new(gateway_state(upstream, 3, Duration::from_secs(30)));

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .default_service(web::route().to(proxy::proxy)),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v2/nothing").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 404);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[actix_web::test]
async fn unreachable_upstream_maps_to_bad_gateway() {
    // Nothing listens on this port.
    let state = web::Data::new(gateway_state(
        "http://127.0.0.1:1".to_string(),
        5,
        Duration::from_secs(30),
    ));

    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .default_service(web::route().to(proxy::proxy)),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/offerings/abc")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 502);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], "BAD_GATEWAY");
}
