use std::sync::Arc;

use spinfan::core::fan_control::decision::{Decision, DecisionMode, DecisionSource};
use spinfan::core::fan_control::disk_state::DiskObservation;
use spinfan::core::fan_control::store::{CycleReport, RuntimeStore};
use spinfan::logging::LogBuffer;
use spinfan::server::{router, StatusState};
use tokio::net::TcpListener;

async fn serve(state: StatusState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_status_endpoint() {
    let store = Arc::new(RuntimeStore::new());
    store.publish(&CycleReport {
        observation: DiskObservation {
            spinning_count: 3,
            temps_observed: 3,
            max_temperature: Some(42.0),
            source_tag: "live".to_string(),
        },
        decision: Decision {
            duty: 67,
            mode: DecisionMode::Normal,
            source: DecisionSource::Curve,
        },
        at: 1_700_000_000,
    });
    store.sample_history(1_700_000_000);

    let logs = LogBuffer::new();
    logs.push("Update: target_pwm=67".to_string());

    let base = serve(StatusState { store, logs }).await;
    let body: serde_json::Value = reqwest::get(format!("{}/api/status", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"]["target_pwm"], 67);
    assert_eq!(body["status"]["max_temp"], 42.0);
    assert_eq!(body["status"]["mode"], "normal");
    assert_eq!(body["status"]["history"][0]["pwm"], 67);
    assert!(body["status"]["updated_at_human"]
        .as_str()
        .unwrap()
        .contains("UTC"));
    assert_eq!(body["mqtt_connected"], false);
    assert_eq!(body["log_text"], "Update: target_pwm=67");
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = StatusState {
        store: Arc::new(RuntimeStore::new()),
        logs: LogBuffer::new(),
    };
    let base = serve(state).await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
