//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 왜 PostgreSQL을 선택했는가?
//! A: 보상/민팅 파이프라인에 적합한 이유
//!
//!    1. ACID 트랜잭션: 클레임/민팅 상태 무결성 보장
//!    2. Partial unique index: (user, course) 중복 민팅을 DB 레벨에서 차단
//!    3. JSONB: NFT 메타데이터 스냅샷 저장 용이
//!    4. 단일 문장 upsert: 읽고-쓰기 경합 없이 진행도 갱신
//!    5. 생태계: SQLx, Diesel 등 Rust 라이브러리 지원
//!
//! Q: 클레임 동시성은 어떻게 처리하는가?
//! A: compare-and-set 형태의 조건부 upsert 한 문장으로 처리
//!
//!    ```sql
//!    INSERT ... ON CONFLICT (user_id, reward_id)
//!    DO UPDATE SET claimed = TRUE
//!    WHERE user_rewards.claimed = FALSE
//!    ```
//!
//!    - rows_affected = 0 → 이미 클레임됨 (경합 패자)
//!    - 애플리케이션 락이나 SELECT FOR UPDATE 불필요
//!    - 민팅 부수효과는 이 게이트를 통과한 요청만 실행
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최소/최대 커넥션 수 설정
//!    - 커넥션 재사용 (오버헤드 감소)
//!    - 자동 health check
//!    - 타임아웃 처리

mod models;
mod store;

pub use models::*;
pub use store::RewardStore;
#[cfg(test)]
pub use store::mock;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::types::{AssetStatus, RequirementType};

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10 (트래픽에 따라 조정)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ============ 보상 카탈로그 ============

    /// 전체 보상 목록 조회
    pub async fn list_rewards(&self) -> Result<Vec<Reward>> {
        let rewards = sqlx::query_as::<_, Reward>(
            r#"
            SELECT
                id, slug, name, description, requirement_type,
                requirement, image_url, grants_nft, created_at
            FROM rewards
            ORDER BY created_at ASC
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rewards)
    }

    /// 보상 단건 조회
    pub async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"
            SELECT
                id, slug, name, description, requirement_type,
                requirement, image_url, grants_nft, created_at
            FROM rewards
            WHERE id = $1
            "#
        )
        .bind(reward_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reward)
    }

    /// slug로 보상 조회 (welcome 보상 등 고정 핸들용)
    pub async fn get_reward_by_slug(&self, slug: &str) -> Result<Option<Reward>> {
        let reward = sqlx::query_as::<_, Reward>(
            r#"
            SELECT
                id, slug, name, description, requirement_type,
                requirement, image_url, grants_nft, created_at
            FROM rewards
            WHERE slug = $1
            "#
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reward)
    }

    // ============ 진행 상태 ============

    /// 보상 카탈로그 + 사용자 진행 상태 조인 조회
    ///
    /// user_rewards 행이 없는 보상은 progress=0, claimed=false로 채워짐
    pub async fn rewards_with_progress(&self, user_id: Uuid) -> Result<Vec<RewardStatusRow>> {
        let rows = sqlx::query_as::<_, RewardStatusRow>(
            r#"
            SELECT
                r.id, r.slug, r.name, r.description, r.requirement_type,
                r.requirement, r.image_url, r.grants_nft, r.created_at,
                COALESCE(ur.progress, 0) AS progress,
                COALESCE(ur.claimed, FALSE) AS claimed,
                COALESCE(ur.notified_threshold, 0) AS notified_threshold
            FROM rewards r
            LEFT JOIN user_rewards ur
                ON ur.reward_id = r.id AND ur.user_id = $1
            ORDER BY r.created_at ASC
            "#
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// 카테고리에 속한 모든 보상의 진행도를 delta만큼 증감 (upsert)
    ///
    /// - 행이 없으면 생성: progress = max(delta, 0)
    /// - 있으면 가산: progress = max(progress + delta, 0)
    /// - 이미 클레임된 행은 건드리지 않음 (동결)
    ///
    /// 반환값은 실제로 생성/갱신된 행 수
    pub async fn bump_progress(
        &self,
        user_id: Uuid,
        category: RequirementType,
        delta: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_rewards (user_id, reward_id, progress)
            SELECT $1, r.id, GREATEST($3, 0)
            FROM rewards r
            WHERE r.requirement_type = $2
            ON CONFLICT (user_id, reward_id)
            DO UPDATE SET
                progress = GREATEST(user_rewards.progress + $3, 0),
                updated_at = NOW()
            WHERE user_rewards.claimed = FALSE
            "#
        )
        .bind(user_id)
        .bind(category.as_str())
        .bind(delta as i32)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// 카테고리 진행도를 source-of-truth 카운트로 덮어쓰기
    ///
    /// 증분 경로가 어긋났을 때의 복구 경로 (클레임된 행은 동결 유지)
    pub async fn reconcile_progress(
        &self,
        user_id: Uuid,
        category: RequirementType,
        count: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_rewards (user_id, reward_id, progress)
            SELECT $1, r.id, GREATEST($3, 0)
            FROM rewards r
            WHERE r.requirement_type = $2
            ON CONFLICT (user_id, reward_id)
            DO UPDATE SET
                progress = GREATEST($3, 0),
                updated_at = NOW()
            WHERE user_rewards.claimed = FALSE
            "#
        )
        .bind(user_id)
        .bind(category.as_str())
        .bind(count as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 활동 테이블에서 카테고리별 실제 카운트 조회
    ///
    /// 쿼리 문자열은 RequirementType variant에 고정되어 있음 (동적 SQL 아님)
    pub async fn count_activity(&self, user_id: Uuid, category: RequirementType) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(category.count_query())
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // ============ 클레임 & 알림 ============

    /// 클레임 게이트 (compare-and-set)
    ///
    /// claimed=false인 행만 claimed=true로 전환하고 그 행을 반환.
    /// None 반환 = 이미 클레임됨 (경합 포함) → 민팅 부수효과 진입 불가
    pub async fn try_claim(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        progress: i64,
    ) -> Result<Option<UserReward>> {
        let row = sqlx::query_as::<_, UserReward>(
            r#"
            INSERT INTO user_rewards (user_id, reward_id, progress, claimed)
            VALUES ($1, $2, GREATEST($3, 0), TRUE)
            ON CONFLICT (user_id, reward_id)
            DO UPDATE SET
                claimed = TRUE,
                progress = GREATEST($3, 0),
                updated_at = NOW()
            WHERE user_rewards.claimed = FALSE
            RETURNING user_id, reward_id, progress, claimed,
                      notified_threshold, created_at, updated_at
            "#
        )
        .bind(user_id)
        .bind(reward_id)
        .bind(progress as i32)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// 알림 임계값 마커 전진 (compare-and-set)
    ///
    /// 저장된 마커보다 높은 임계값일 때만 갱신 → 같은 임계값 중복 알림 차단.
    /// true 반환 = 이번 호출이 마커를 전진시켰음 (알림 발송 권한 획득)
    pub async fn advance_notified(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        threshold: i32,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_rewards
            SET notified_threshold = $3, updated_at = NOW()
            WHERE user_id = $1 AND reward_id = $2
              AND notified_threshold < $3
              AND claimed = FALSE
            "#
        )
        .bind(user_id)
        .bind(reward_id)
        .bind(threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// 알림 저장
    pub async fn insert_notification(&self, notification: &NewNotification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, issuer_id, recipient_id, kind, message, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#
        )
        .bind(notification.id)
        .bind(notification.issuer_id)
        .bind(notification.recipient_id)
        .bind(&notification.kind)
        .bind(&notification.message)
        .bind(&notification.metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ============ 에셋 ============

    /// pending 에셋 삽입 (중복 민팅 게이트)
    ///
    /// (user, course) / (user, reward) 부분 유니크 인덱스와 충돌하면
    /// false 반환 = 이미 민팅됨. 체인 호출보다 먼저 실행되어야 함
    pub async fn insert_pending_asset(&self, asset: &NewAsset) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO assets (id, user_id, course_id, reward_id, asset_type, collection_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#
        )
        .bind(asset.id)
        .bind(asset.user_id)
        .bind(asset.course_id)
        .bind(asset.reward_id)
        .bind(&asset.asset_type)
        .bind(&asset.collection_name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// 에셋 확정: transfer까지 끝난 뒤에만 호출
    pub async fn confirm_asset(
        &self,
        asset_id: Uuid,
        token_address: &str,
        tx_hash: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE assets
            SET status = $5,
                token_address = $2,
                tx_hash = $3,
                metadata = $4,
                confirmed_at = NOW()
            WHERE id = $1
            "#
        )
        .bind(asset_id)
        .bind(token_address)
        .bind(tx_hash)
        .bind(metadata)
        .bind(AssetStatus::Confirmed.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 에셋 단건 조회
    pub async fn get_asset(&self, asset_id: Uuid) -> Result<Option<Asset>> {
        let asset = sqlx::query_as::<_, Asset>(
            r#"
            SELECT
                id, user_id, course_id, reward_id, asset_type, collection_name,
                token_address, tx_hash, metadata, status, created_at, confirmed_at
            FROM assets
            WHERE id = $1
            "#
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(asset)
    }

    /// cutoff보다 오래된 pending 에셋 조회 (스윕 대상)
    pub async fn pending_assets_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Asset>> {
        let assets = sqlx::query_as::<_, Asset>(
            r#"
            SELECT
                id, user_id, course_id, reward_id, asset_type, collection_name,
                token_address, tx_hash, metadata, status, created_at, confirmed_at
            FROM assets
            WHERE status = $2 AND created_at < $1
            ORDER BY created_at ASC
            "#
        )
        .bind(cutoff)
        .bind(AssetStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(assets)
    }

    /// 스윕이 포기한 에셋 표시 (운영자 확인 필요)
    pub async fn mark_orphaned(&self, asset_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE assets SET status = $2 WHERE id = $1")
            .bind(asset_id)
            .bind(AssetStatus::Orphaned.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ============ 플랫폼 테이블 (읽기 전용) ============

    /// 전체 사용자 id 목록 (check-progress 배치 순회용)
    pub async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    /// 사용자 조회
    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, display_name, email_verified, wallet_address
            FROM users
            WHERE id = $1
            "#
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// 세션 토큰으로 사용자 조회 (만료된 세션 제외)
    pub async fn session_user(&self, token: &str) -> Result<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT u.id, u.display_name, u.email_verified, u.wallet_address
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > NOW()
            "#
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// 강의 조회
    pub async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, title, description, image_url, created_at
            FROM courses
            WHERE id = $1
            "#
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    /// 수강 등록 여부 확인
    pub async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)"
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(enrolled)
    }
}
