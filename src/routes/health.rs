//! Health Check Endpoint
//!
//! # Interview Q&A
//!
//! Q: 단순 200 OK 대신 DB까지 확인하는 이유는?
//! A: "프로세스 살아있음"과 "서비스 가능"은 다름
//!    - 커넥션 풀이 죽은 서버가 200을 돌려주면 로드밸런서가 트래픽을 계속 보냄
//!    - SELECT 1 왕복 시간을 latency_ms로 같이 노출해 풀 포화도 조기 감지

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct DatabaseStatus {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// GET /health
///
/// 서버 및 DB 상태 확인 (인증 불필요)
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let started = std::time::Instant::now();
    let database = match state.db.health_check().await {
        Ok(_) => DatabaseStatus {
            connected: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
        },
        Err(_) => DatabaseStatus {
            connected: false,
            latency_ms: None,
        },
    };

    Json(HealthResponse {
        status: if database.connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
