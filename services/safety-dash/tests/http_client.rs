// services/safety-dash/tests/http_client.rs
//
// ApiClient and PollScheduler against an in-process HTTP backend

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;

use safety_dash::connection::ConnectionState;
use safety_dash::{AnalyticsSource, ApiClient, CommitOutcome, DashboardState, PollConfig, PollEvent, PollScheduler};
use svckit::FetchError;

const TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Default)]
struct Backend {
    seen_limits: Arc<Mutex<Vec<String>>>,
}

async fn detections(State(backend): State<Backend>, Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    if let Some(limit) = params.get("limit") {
        backend.seen_limits.lock().unwrap().push(limit.clone());
    }
    Json(json!({
        "detections": [
            {"id": 2, "ts": "2025-03-01 09:15:00", "camera": "cam1", "class": 3, "conf": 0.91,
             "violation_type": "no_helmet", "image_url": "/media/violations/2.jpg"},
            {"id": 1, "ts": "2025-03-01 09:14:00", "camera": "cam1", "class": "0", "class_name": "person",
             "conf": 0.82, "violation_type": null}
        ],
        "count": 2
    }))
}

async fn hourly() -> impl IntoResponse {
    Json(json!({"data": [{"hour": "2025-03-01 08", "cnt": 3}, {"hour": "2025-03-01 09", "cnt": 2}]}))
}

async fn violations() -> impl IntoResponse {
    Json(json!({"data": [{"violation_type": "no_helmet", "cnt": 1}]}))
}

async fn last_frame() -> impl IntoResponse {
    let img = RgbImage::from_pixel(32, 18, Rgb([200, 90, 10]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    ([(header::CONTENT_TYPE, "image/png")], out.into_inner())
}

fn healthy_routes(backend: Backend) -> Router {
    Router::new()
        .route("/api/detections", get(detections))
        .route("/api/stats/hourly", get(hourly))
        .route("/api/stats/violations", get(violations))
        .route("/media/last_frame", get(last_frame))
        .with_state(backend)
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> ApiClient {
    ApiClient::new(&format!("http://{}", addr), TIMEOUT)
}

#[tokio::test]
async fn test_detections_request_carries_limit() {
    let backend = Backend::default();
    let addr = serve(healthy_routes(backend.clone())).await;
    let api = client(addr);

    let records = api.get_detections(NonZeroUsize::new(25).unwrap()).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].label(), "no_helmet");
    assert!(records[0].is_violation());
    assert_eq!(records[1].label(), "person");
    assert!(!records[1].is_violation());
    assert_eq!(backend.seen_limits.lock().unwrap().as_slice(), ["25"]);
}

#[tokio::test]
async fn test_stats_endpoints_decode() {
    let addr = serve(healthy_routes(Backend::default())).await;
    let api = client(addr);

    let hourly = api.get_hourly_stats().await.unwrap();
    assert_eq!(hourly.iter().map(|h| h.cnt).collect::<Vec<_>>(), vec![3, 2]);

    let violations = api.get_violation_stats().await.unwrap();
    assert_eq!(violations[0].label(), "no_helmet");
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let app = Router::new().route("/api/stats/hourly", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
    let addr = serve(app).await;

    let err = client(addr).get_hourly_stats().await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Status {
            endpoint: "/api/stats/hourly".to_string(),
            status: 500
        }
    );
    assert!(!err.is_unreachable());
}

#[tokio::test]
async fn test_missing_collections_are_empty() {
    let app = Router::new()
        .route("/api/detections", get(|| async { Json(json!({})) }))
        .route("/api/stats/violations", get(|| async { Json(json!({"data": null})) }));
    let addr = serve(app).await;
    let api = client(addr);

    assert!(api.get_detections(NonZeroUsize::MIN).await.unwrap().is_empty());
    assert!(api.get_violation_stats().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let app = Router::new().route("/api/detections", get(|| async { "<html>gateway</html>" }));
    let addr = serve(app).await;

    let err = client(addr).get_detections(NonZeroUsize::MIN).await.unwrap_err();

    assert!(matches!(err, FetchError::Decode { ref endpoint, .. } if endpoint == "/api/detections"));
}

#[tokio::test]
async fn test_last_frame_bytes() {
    let addr = serve(healthy_routes(Backend::default())).await;
    let api = client(addr);

    let frame_url = api.last_frame_url();
    let bytes = api.fetch_image(&frame_url.url).await.unwrap();
    let frame = safety_dash::frame::decode_frame(frame_url.token, &bytes).unwrap();

    assert_eq!((frame.width, frame.height), (32, 18));
}

#[tokio::test]
async fn test_missing_frame_maps_to_status() {
    let addr = serve(Router::new()).await;
    let api = client(addr);

    let err = api.fetch_image(&api.last_frame_url().url).await.unwrap_err();

    assert_eq!(
        err,
        FetchError::Status {
            endpoint: "/media/last_frame".to_string(),
            status: 404
        }
    );
}

async fn first_cycle(state: &mut DashboardState, source: Arc<dyn AnalyticsSource>) -> CommitOutcome {
    let config = PollConfig {
        data_interval: Duration::from_secs(60),
        frame_interval: Duration::from_secs(60),
        detection_limit: NonZeroUsize::new(10).unwrap(),
    };
    let mut subscription = PollScheduler::start(source, config);

    let outcome = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match subscription.next_event().await {
                Some(event @ PollEvent::Cycle { .. }) => break state.apply(event),
                Some(event) => {
                    state.apply(event);
                }
                None => panic!("poller stopped before the first cycle"),
            }
        }
    })
    .await
    .unwrap();

    subscription.shutdown();
    outcome
}

#[tokio::test]
async fn test_poll_cycle_against_live_backend() {
    let addr = serve(healthy_routes(Backend::default())).await;
    let mut state = DashboardState::new();

    let outcome = first_cycle(&mut state, Arc::new(client(addr))).await;

    assert_eq!(outcome, CommitOutcome::Applied);
    assert_eq!(state.connection.state(), ConnectionState::Connected);
    let metrics = state.snapshot().unwrap().metrics();
    assert_eq!(metrics.total_detections, 2);
    assert_eq!(metrics.total_violations, 1);
    assert_eq!(metrics.compliance_display(), "50.0");
}

#[tokio::test]
async fn test_unreachable_backend_disconnects() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let api = client(addr);

    let err = api.get_hourly_stats().await.unwrap_err();
    assert!(err.is_unreachable(), "unexpected error: {:?}", err);

    let mut state = DashboardState::new();
    let outcome = first_cycle(&mut state, Arc::new(api)).await;

    assert_eq!(outcome, CommitOutcome::Failed);
    assert!(!state.is_loading());
    assert!(state.snapshot().is_none());
    assert_eq!(state.connection.state(), ConnectionState::Disconnected);
}
