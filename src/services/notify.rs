//! Reward Notification Trigger
//!
//! # Interview Q&A
//!
//! Q: 같은 임계값에서 알림이 중복 발송되지 않는 근거는?
//! A: user_rewards.notified_threshold 마커 + CAS 전진
//!    - 평가 시점의 임계값(75 또는 100)이 저장된 마커보다 클 때만
//!      마커를 전진시키고, 전진에 **성공한** 호출만 알림을 발송
//!    - 마커 전진은 조건부 UPDATE 한 문장 → 동시 평가가 겹쳐도
//!      발송 권한은 한 쪽만 가져감
//!    - 트리거를 몇 번 다시 돌려도 같은 임계값에서는 침묵
//!
//! Q: 마커 전진과 알림 삽입의 순서는?
//! A: 마커 먼저. 사이에서 죽으면 알림 하나가 누락될 수 있지만,
//!    반대 순서는 중복 발송이 가능함. 누락을 선택

use anyhow::Result;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{NewNotification, RewardStore};

/// 보상 진행 알림의 kind 값
pub const KIND_REWARD_PROGRESS: &str = "REWARD_PROGRESS";

/// 알림을 발송하는 최소 달성률 (%)
const NEARLY_DONE_THRESHOLD: i32 = 75;
const COMPLETED_THRESHOLD: i32 = 100;

/// 임계값 교차 알림 트리거
pub struct Notifier {
    store: Arc<dyn RewardStore>,
    issuer_id: Uuid,
}

impl Notifier {
    pub fn new(store: Arc<dyn RewardStore>, issuer_id: Uuid) -> Self {
        Self { store, issuer_id }
    }

    /// 사용자의 전체 보상에 대해 임계값 교차를 평가
    ///
    /// 반환값은 이번 호출로 실제 발송된 알림 수
    pub async fn evaluate_user(&self, user_id: Uuid) -> Result<u32> {
        let rows = self.store.rewards_with_progress(user_id).await?;
        let mut sent = 0u32;

        for row in rows {
            // 클레임된 보상은 침묵, requirement<=0은 임계값 계산이 무의미
            if row.claimed || row.requirement <= 0 {
                continue;
            }

            let percentage = 100.0 * row.progress as f64 / row.requirement as f64;
            let threshold = if percentage >= COMPLETED_THRESHOLD as f64 {
                COMPLETED_THRESHOLD
            } else if percentage >= NEARLY_DONE_THRESHOLD as f64 {
                NEARLY_DONE_THRESHOLD
            } else {
                continue;
            };

            // 마커 전진에 성공한 호출만 발송 권한을 가짐
            if !self.store.advance_notified(user_id, row.id, threshold).await? {
                continue;
            }

            let message = if threshold == COMPLETED_THRESHOLD {
                format!("Reward '{}' fully completed! Claim it now.", row.name)
            } else {
                format!(
                    "You're almost there! '{}' is {:.0}% complete.",
                    row.name, percentage
                )
            };

            let notification = NewNotification {
                id: Uuid::new_v4(),
                issuer_id: self.issuer_id,
                recipient_id: user_id,
                kind: KIND_REWARD_PROGRESS.to_string(),
                message,
                metadata: serde_json::json!({
                    "rewardId": row.id,
                    "percentage": percentage.round() as i64,
                }),
            };
            self.store.insert_notification(&notification).await?;
            sent += 1;
        }

        if sent > 0 {
            tracing::info!("Sent {} reward notifications to user {}", sent, user_id);
        }
        Ok(sent)
    }
}
