//! Reward Endpoints
//!
//! 보상 카탈로그 조회, 활동 진행도 반영, 클레임, 정합성 재계산.
//! 모든 엔드포인트는 bearer 세션 토큰 인증 필수.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::{RewardStatusRow, UserReward},
    error::ApiError,
    services::RetryPolicy,
    types::RequirementType,
    AppState,
};

// ============ Request/Response Types ============

/// 보상 한 건 + 내 진행 상태
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// RequirementType 문자열 (예: "LIKES")
    pub requirement_type: String,
    pub requirement: i32,
    pub image_url: Option<String>,
    pub grants_nft: bool,
    pub progress: i32,
    pub claimed: bool,
    /// 0~100, 달성 이후에도 100으로 고정
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub rewards: Vec<RewardItem>,
    pub success: bool,
}

/// 진행도 갱신 요청
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    /// 활동 카테고리 (예: "POSTS", "COMMUNITY_JOINS")
    pub category: String,
    /// 증감량. 생략하면 1, 삭제 롤백이면 음수
    pub delta: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckProgressResponse {
    pub message: String,
}

/// 클레임 요청
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub reward_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRewardDto {
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub progress: i32,
    pub claimed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub message: String,
    pub user_reward: UserRewardDto,
    pub success: bool,
}

impl From<RewardStatusRow> for RewardItem {
    fn from(row: RewardStatusRow) -> Self {
        let percentage = completion_percentage(row.progress, row.requirement);
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            requirement_type: row.requirement_type,
            requirement: row.requirement,
            image_url: row.image_url,
            grants_nft: row.grants_nft,
            progress: row.progress,
            claimed: row.claimed,
            percentage,
        }
    }
}

impl From<UserReward> for UserRewardDto {
    fn from(row: UserReward) -> Self {
        Self {
            user_id: row.user_id,
            reward_id: row.reward_id,
            progress: row.progress,
            claimed: row.claimed,
        }
    }
}

// ============ Handlers ============

/// GET /api/rewards
///
/// 전체 보상 카탈로그 + 내 진행 상태 (TTL 캐시 적용)
///
/// # Response
///
/// ```json
/// {
///   "rewards": [{
///     "id": "c0a80121-...",
///     "name": "Community Star",
///     "requirementType": "LIKES",
///     "requirement": 10,
///     "progress": 7,
///     "percentage": 70.0,
///     "claimed": false,
///     "grantsNft": true
///   }],
///   "success": true
/// }
/// ```
pub async fn list_rewards(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<RewardsResponse>, ApiError> {
    let rows = state.engine.rewards_overview(user.id).await?;
    Ok(Json(RewardsResponse {
        rewards: rows.into_iter().map(RewardItem::from).collect(),
        success: true,
    }))
}

/// POST /api/rewards/progress
///
/// 사용자 활동 한 건을 진행도에 반영하고 임계값 알림을 평가
///
/// # Request
///
/// ```json
/// { "category": "POSTS", "delta": 1 }
/// ```
pub async fn record_progress(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ProgressRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let category: RequirementType = req.category.parse().map_err(ApiError::ValidationError)?;
    let delta = req.delta.unwrap_or(1);

    // 일시적 DB 장애 대비 재시도 (카테고리 오류 등은 위에서 이미 걸러짐)
    let engine = state.engine.clone();
    RetryPolicy::default()
        .run("progress update", || {
            let engine = engine.clone();
            async move { engine.apply_action(user.id, category, delta).await }
        })
        .await?;

    // 갱신 직후 임계값 교차 여부 평가
    state.notifier.evaluate_user(user.id).await?;

    Ok(Json(MessageResponse {
        message: "Progress updated".to_string(),
        success: true,
    }))
}

/// POST /api/rewards/claim
///
/// 달성한 보상 클레임. NFT 보상이면 민팅/전송까지 수행
///
/// # Response
///
/// ```json
/// {
///   "message": "Reward claimed",
///   "userReward": { "userId": "...", "rewardId": "...", "progress": 12, "claimed": true },
///   "success": true
/// }
/// ```
pub async fn claim_reward(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let outcome = state.minter.claim_reward(user.id, req.reward_id).await?;

    let message = match &outcome.minted {
        Some(minted) => format!("Reward claimed and NFT '{}' minted", minted.token_name),
        None => "Reward claimed".to_string(),
    };

    Ok(Json(ClaimResponse {
        message,
        user_reward: UserRewardDto::from(outcome.user_reward),
        success: true,
    }))
}

/// GET /api/rewards/check-progress
///
/// 전체 사용자의 진행도를 활동 테이블 기준으로 재계산하고 알림을 평가.
/// 증분 갱신 드리프트의 복구 경로로, 크론에서 주기 호출하는 배치 작업
pub async fn check_progress(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<CheckProgressResponse>, ApiError> {
    let user_ids = state.store.list_user_ids().await?;

    for user_id in &user_ids {
        state.engine.reconcile_user(*user_id).await?;
        state.notifier.evaluate_user(*user_id).await?;
    }

    Ok(Json(CheckProgressResponse {
        message: format!("Checked reward progress for {} users", user_ids.len()),
    }))
}

// ============ Helpers ============

/// 진행률 (%). requirement가 0이면 즉시 달성으로 간주
fn completion_percentage(progress: i32, requirement: i32) -> f64 {
    if requirement <= 0 {
        return 100.0;
    }
    ((progress as f64 / requirement as f64) * 100.0).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_partial() {
        assert_eq!(completion_percentage(7, 10), 70.0);
    }

    #[test]
    fn test_percentage_caps_at_hundred() {
        assert_eq!(completion_percentage(25, 10), 100.0);
    }

    #[test]
    fn test_zero_requirement_counts_as_complete() {
        assert_eq!(completion_percentage(0, 0), 100.0);
    }

    #[test]
    fn test_reward_item_wire_casing() {
        let row = RewardStatusRow {
            id: Uuid::new_v4(),
            slug: None,
            name: "Community Star".to_string(),
            description: "Collect likes".to_string(),
            requirement_type: "LIKES".to_string(),
            requirement: 10,
            image_url: None,
            grants_nft: true,
            created_at: chrono::Utc::now(),
            progress: 7,
            claimed: false,
            notified_threshold: 0,
        };
        let json = serde_json::to_value(RewardItem::from(row)).unwrap();
        assert_eq!(json["requirementType"], "LIKES");
        assert_eq!(json["grantsNft"], true);
        assert_eq!(json["percentage"], 70.0);
    }
}
