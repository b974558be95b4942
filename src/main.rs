//! Eduverse Rewards API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Client (Learning Frontend)                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /api/rewards/*  /api/nft/*                    ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Services Layer                        ││
//! │  │  ProgressEngine    Notifier    MintService              ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Data Layer                            ││
//! │  │  PostgreSQL Store    In-process TTL Cache               ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Chain Fullnode (REST API)                    │
//! │  create_collection       mint       transfer                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// 라이브러리에서 가져오기
use eduverse_rewards_api::{
    db::RewardStore,
    routes,
    services::{ChainClient, FullnodeClient, MintService, Notifier, ProgressEngine, RewardCache},
    AppState, Config, Database,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug,sqlx=warn 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "eduverse_rewards_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Eduverse Rewards API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!("📋 Configuration loaded");

    // 데이터베이스 연결
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("🗄️  Database connected");

    // 마이그레이션 실행
    db.run_migrations().await?;
    tracing::info!("📦 Migrations completed");

    // 체인 클라이언트 (플랫폼 계정 서명키 필수)
    let private_key = config
        .platform_private_key
        .clone()
        .context("PLATFORM_PRIVATE_KEY must be set")?;
    let chain: Arc<dyn ChainClient> = Arc::new(FullnodeClient::new(
        &config.chain_node_url,
        &private_key,
    )?);
    tracing::info!("⛓️  Chain client ready");

    // 서비스 초기화
    let db = Arc::new(db);
    let store: Arc<dyn RewardStore> = db.clone();
    let cache = Arc::new(RewardCache::new(config.cache_ttl_secs));
    let engine = Arc::new(ProgressEngine::new(store.clone(), cache.clone()));
    let notifier = Arc::new(Notifier::new(store.clone(), config.system_issuer_id));
    let minter = Arc::new(MintService::new(
        store.clone(),
        chain,
        cache.clone(),
        &config.nft_collection_name,
    ));
    tracing::info!("🎁 Reward services initialized");

    // 앱 상태 구성
    let state = AppState {
        db,
        store,
        cache,
        engine,
        notifier,
        minter,
        config: Arc::new(config.clone()),
    };

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET  /health                      - 서버 상태 확인
///
/// GET  /api/rewards                 - 보상 카탈로그 + 진행 상태
/// POST /api/rewards/progress        - 활동 진행도 반영
/// POST /api/rewards/claim           - 보상 클레임 (NFT 보상이면 민팅)
/// GET  /api/rewards/check-progress  - 전체 사용자 진행도 재계산 (배치)
///
/// POST /api/nft/mint                - 강의 수료 NFT 민팅
/// POST /api/nft/welcome             - 가입 기념 NFT
/// POST /api/nft/reconcile           - pending 에셋 스윕 (크론)
/// ```
fn create_router(state: AppState) -> Router {
    // CORS 설정
    // 프로덕션에서는 특정 도메인만 허용
    // 개발 환경에서는 localhost 허용
    let cors = if state.config.is_production() {
        // 프로덕션: 특정 도메인만 허용 (환경변수로 설정)
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "https://eduverse.example".to_string());
        let origins: Vec<_> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
            ])
    } else {
        // 개발: localhost 허용
        CorsLayer::new()
            .allow_origin([
                "http://localhost:5173".parse().unwrap(),  // Vite dev server
                "http://localhost:3000".parse().unwrap(),  // Alternative
                "http://127.0.0.1:5173".parse().unwrap(),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Rewards
        .route("/api/rewards", get(routes::rewards::list_rewards))
        .route("/api/rewards/progress", post(routes::rewards::record_progress))
        .route("/api/rewards/claim", post(routes::rewards::claim_reward))
        .route("/api/rewards/check-progress", get(routes::rewards::check_progress))

        // NFT
        .route("/api/nft/mint", post(routes::nft::mint_course_nft))
        .route("/api/nft/welcome", post(routes::nft::mint_welcome_nft))
        .route("/api/nft/reconcile", post(routes::nft::reconcile_assets))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
