//! NFT Minting Endpoints
//!
//! 강의 수료 NFT, 가입 기념 NFT, pending 에셋 스윕.
//! 체인 호출을 동반하므로 응답 지연이 수 초까지 갈 수 있음

use axum::{extract::State, Json};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::AuthUser, db::Asset, error::ApiError, services::MintOutcome, AppState};

/// 이 나이를 넘긴 pending만 스윕 대상 (본래 요청이 아직 진행 중일 수 있음)
const SWEEP_MIN_AGE_MINUTES: i64 = 10;

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintCourseRequest {
    pub course_id: Uuid,
}

/// 민팅된 NFT 요약
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NftDto {
    pub token_address: String,
    pub tx_hash: String,
    pub collection: String,
    pub name: String,
}

/// 에셋 레코드
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDto {
    pub id: Uuid,
    pub asset_type: String,
    pub course_id: Option<Uuid>,
    pub reward_id: Option<Uuid>,
    pub token_address: Option<String>,
    pub tx_hash: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct MintResponse {
    pub success: bool,
    pub nft: NftDto,
    pub asset: AssetDto,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub message: String,
    pub retried: u32,
    pub confirmed: u32,
    pub orphaned: u32,
}

impl From<Asset> for AssetDto {
    fn from(asset: Asset) -> Self {
        Self {
            id: asset.id,
            asset_type: asset.asset_type,
            course_id: asset.course_id,
            reward_id: asset.reward_id,
            token_address: asset.token_address,
            tx_hash: asset.tx_hash,
            status: asset.status,
        }
    }
}

impl From<MintOutcome> for MintResponse {
    fn from(outcome: MintOutcome) -> Self {
        Self {
            success: true,
            nft: NftDto {
                token_address: outcome.token_address,
                tx_hash: outcome.tx_hash,
                collection: outcome.asset.collection_name.clone(),
                name: outcome.token_name,
            },
            asset: AssetDto::from(outcome.asset),
        }
    }
}

// ============ Handlers ============

/// POST /api/nft/mint
///
/// 수강 중인 강의의 수료 NFT 민팅 (사용자·강의당 1회)
///
/// # Request
///
/// ```json
/// { "courseId": "a1b2c3d4-..." }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "nft": {
///     "tokenAddress": "0x8f3a...",
///     "txHash": "0x5c1e...",
///     "collection": "Eduverse Achievements",
///     "name": "Intro to Move - Completion Certificate"
///   },
///   "asset": { "id": "...", "assetType": "course_completion", "status": "confirmed" }
/// }
/// ```
pub async fn mint_course_nft(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<MintCourseRequest>,
) -> Result<Json<MintResponse>, ApiError> {
    let outcome = state.minter.mint_course_nft(user.id, req.course_id).await?;
    Ok(Json(MintResponse::from(outcome)))
}

/// POST /api/nft/welcome
///
/// 가입 기념 NFT 클레임+민팅 (계정당 1회)
pub async fn mint_welcome_nft(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MintResponse>, ApiError> {
    let outcome = state.minter.claim_welcome(user.id).await?;
    let minted = outcome.minted.ok_or_else(|| {
        tracing::error!("Welcome reward is not configured to grant an NFT");
        ApiError::InternalError
    })?;
    Ok(Json(MintResponse::from(minted)))
}

/// POST /api/nft/reconcile
///
/// 오래된 pending 에셋 재처리. 크론에서 주기 호출
///
/// # Response
///
/// ```json
/// { "message": "Reconciled 2 pending assets", "retried": 2, "confirmed": 1, "orphaned": 1 }
/// ```
pub async fn reconcile_assets(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let report = state
        .minter
        .reconcile_pending(Duration::minutes(SWEEP_MIN_AGE_MINUTES))
        .await?;

    Ok(Json(ReconcileResponse {
        message: format!("Reconciled {} pending assets", report.retried),
        retried: report.retried,
        confirmed: report.confirmed,
        orphaned: report.orphaned,
    }))
}
