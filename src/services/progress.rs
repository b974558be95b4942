//! Reward Progress Engine
//!
//! # Interview Q&A
//!
//! Q: 진행도 갱신 경로가 두 개인 이유는?
//! A: 증분 경로와 재동기화 경로는 역할이 다름
//!
//!    1. apply_action (증분): 사용자 액션마다 delta를 가산
//!       - 빠르지만 이벤트 유실/중복에 취약 → 시간이 지나면 드리프트
//!    2. reconcile_user (재동기화): 활동 테이블을 직접 COUNT해서 덮어씀
//!       - source of truth 복원 경로
//!       - 클레임 검증은 반드시 이 카운트를 읽음 (부풀려진 증분값으로
//!         보상을 클레임할 수 없어야 함)
//!
//! Q: 진행도가 음수가 될 수 있는가?
//! A: 없음. 삭제 이벤트(delta < 0)가 중복 반영되더라도 0에서 멈춤
//!    (DB upsert의 GREATEST와 CHECK 제약이 이중으로 보장)
//!
//! Q: 클레임된 보상의 진행도는?
//! A: 동결. 증분/재동기화 모두 claimed=true 행은 건드리지 않음

use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

use super::cache::RewardCache;
use crate::db::{RewardStatusRow, RewardStore};
use crate::types::RequirementType;

/// 보상 진행도 엔진
pub struct ProgressEngine {
    store: Arc<dyn RewardStore>,
    cache: Arc<RewardCache>,
}

impl ProgressEngine {
    pub fn new(store: Arc<dyn RewardStore>, cache: Arc<RewardCache>) -> Self {
        Self { store, cache }
    }

    /// 사용자 액션 반영: 해당 카테고리의 모든 보상 진행도를 delta만큼 증감
    ///
    /// 반환값은 생성/갱신된 user_rewards 행 수
    pub async fn apply_action(
        &self,
        user_id: Uuid,
        category: RequirementType,
        delta: i64,
    ) -> Result<u64> {
        self.cache.invalidate(user_id);
        let touched = self.store.bump_progress(user_id, category, delta).await?;
        tracing::debug!(
            "Progress updated: user={} category={} delta={} rows={}",
            user_id,
            category,
            delta,
            touched
        );
        Ok(touched)
    }

    /// 활동 테이블 기준의 실제 카운트 (클레임 검증용)
    pub async fn authoritative_count(
        &self,
        user_id: Uuid,
        category: RequirementType,
    ) -> Result<i64> {
        self.store.count_activity(user_id, category).await
    }

    /// 전체 카테고리 재동기화: 증분 경로의 드리프트를 복구
    pub async fn reconcile_user(&self, user_id: Uuid) -> Result<()> {
        self.cache.invalidate(user_id);

        for category in RequirementType::ALL {
            let count = self.store.count_activity(user_id, category).await?;
            self.store.reconcile_progress(user_id, category, count).await?;
        }

        tracing::debug!("Progress reconciled: user={}", user_id);
        Ok(())
    }

    /// 보상 목록 + 사용자 진행 상태 (cache-aside)
    pub async fn rewards_overview(&self, user_id: Uuid) -> Result<Vec<RewardStatusRow>> {
        if let Some(rows) = self.cache.get(user_id) {
            return Ok(rows);
        }

        let rows = self.store.rewards_with_progress(user_id).await?;
        self.cache.put(user_id, rows.clone());
        Ok(rows)
    }
}
