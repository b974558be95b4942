//! Eduverse Rewards API Library
//!
//! # Overview
//!
//! 이 라이브러리는 Eduverse 학습 플랫폼의 보상 진행도 추적과
//! 수료/업적 NFT 민팅 백엔드 API를 제공합니다.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!                  ┌─────────────────┐
//!                  │ Chain Fullnode  │
//!                  └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `auth`: 세션 토큰 인증 extractor
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (진행도 엔진, 알림, 민팅 파이프라인)
//! - `db`: 데이터베이스 연동
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use eduverse_rewards_api::{config::Config, db::Database, services::FullnodeClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     let chain = FullnodeClient::new(&config.chain_node_url, "0x...")?;
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod db;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ApiError;
pub use db::Database;
pub use services::{MintService, Notifier, ProgressEngine, RewardCache};

use db::RewardStore;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    /// 서비스가 공유하는 저장소 seam (테스트에서 mock으로 대체)
    pub store: Arc<dyn RewardStore>,
    pub cache: Arc<RewardCache>,
    pub engine: Arc<ProgressEngine>,
    pub notifier: Arc<Notifier>,
    pub minter: Arc<MintService>,
    pub config: Arc<Config>,
}
