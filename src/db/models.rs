//! Database Models
//!
//! Row structs for the reward/mint pipeline. Rewards, per-user progress and
//! minted assets are owned by this service; user/session/course/activity
//! tables belong to the main platform and are read-only here.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::RequirementType;

/// 보상 카탈로그 항목
#[derive(Debug, Clone, FromRow)]
pub struct Reward {
    pub id: Uuid,

    /// 코드에서 이름으로 찾아야 하는 보상의 고정 핸들 (예: 'welcome')
    pub slug: Option<String>,

    pub name: String,
    pub description: String,

    /// 요구사항 카테고리 (RequirementType의 와이어 문자열)
    /// enum 변환은 category()에서 수행
    pub requirement_type: String,

    /// 달성 기준값
    pub requirement: i32,

    pub image_url: Option<String>,

    /// 클레임 시 NFT 민팅 여부
    pub grants_nft: bool,

    pub created_at: DateTime<Utc>,
}

impl Reward {
    /// requirement_type 문자열을 닫힌 enum으로 변환
    ///
    /// 카탈로그는 관리자가 생성하므로 모르는 문자열은 데이터 오류.
    /// 호출부에서 에러로 전파함
    pub fn category(&self) -> Result<RequirementType, String> {
        self.requirement_type.parse()
    }
}

/// 사용자별 보상 진행 상태
///
/// (user_id, reward_id) 복합 PK → 사용자당 보상당 최대 1행
#[derive(Debug, Clone, FromRow)]
pub struct UserReward {
    pub user_id: Uuid,
    pub reward_id: Uuid,

    /// 누적 진행 카운트 (0 미만으로 내려가지 않음)
    pub progress: i32,

    /// 클레임 완료 여부. true가 되면 진행/알림 모두 동결
    pub claimed: bool,

    /// 이미 알림을 보낸 최고 임계값: 0 | 75 | 100
    pub notified_threshold: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 보상 카탈로그 + 사용자 진행 상태 조인 행
///
/// GET /api/rewards 응답과 알림 트리거 평가가 공유하는 읽기 모델
/// (user_rewards 행이 없으면 progress=0, claimed=false로 채워짐)
#[derive(Debug, Clone, FromRow)]
pub struct RewardStatusRow {
    pub id: Uuid,
    pub slug: Option<String>,
    pub name: String,
    pub description: String,
    pub requirement_type: String,
    pub requirement: i32,
    pub image_url: Option<String>,
    pub grants_nft: bool,
    pub created_at: DateTime<Utc>,

    pub progress: i32,
    pub claimed: bool,
    pub notified_threshold: i32,
}

/// 민팅된 NFT 레코드
///
/// 상태 머신: pending → confirmed (transfer 확인 후)
///           pending → orphaned (스윕이 포기)
#[derive(Debug, Clone, FromRow)]
pub struct Asset {
    pub id: Uuid,
    pub user_id: Uuid,

    /// 강의 수료 NFT인 경우에만 설정
    pub course_id: Option<Uuid>,

    /// 보상 NFT인 경우에만 설정
    pub reward_id: Option<Uuid>,

    /// course_completion | reward
    pub asset_type: String,

    pub collection_name: String,

    /// 체인상 토큰 오브젝트 주소 (confirmed 이후에만 존재)
    pub token_address: Option<String>,

    /// 민팅 트랜잭션 해시 (confirmed 이후에만 존재)
    pub tx_hash: Option<String>,

    /// 민팅 당시의 메타데이터 스냅샷
    pub metadata: serde_json::Value,

    /// pending | confirmed | orphaned
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// pending 에셋 삽입 모델
///
/// status='pending'으로 체인 호출 **전에** 기록됨. (user, course) /
/// (user, reward) 부분 유니크 인덱스가 이 삽입을 중복 민팅 게이트로 만듦
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Option<Uuid>,
    pub reward_id: Option<Uuid>,
    pub asset_type: String,
    pub collection_name: String,
}

/// 알림 삽입 모델
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub id: Uuid,
    pub issuer_id: Uuid,
    pub recipient_id: Uuid,
    pub kind: String,
    pub message: String,
    pub metadata: serde_json::Value,
}

/// 플랫폼 사용자 (읽기 전용)
#[derive(Debug, Clone, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub display_name: String,
    pub email_verified: bool,

    /// 연동된 지갑 주소. NFT 보상 클레임의 전제 조건
    pub wallet_address: Option<String>,
}

/// 플랫폼 강의 (읽기 전용)
#[derive(Debug, Clone, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
