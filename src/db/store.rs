//! Store Abstraction
//!
//! # Interview Q&A
//!
//! Q: Repository/Store 패턴을 왜 도입했는가?
//! A: 파이프라인 로직(진행도, 알림, 클레임/민팅 오케스트레이션)을
//!    DB 없이 테스트하기 위해
//!    - 서비스 레이어는 RewardStore trait에만 의존
//!    - 프로덕션: Database (PostgreSQL 구현, db/mod.rs)
//!    - 테스트: MockRewardStore (인메모리, 아래 mock 모듈)
//!
//! Q: trait 메서드를 semantic 단위로 자른 이유는?
//! A: try_claim처럼 "조건부 전환 + 결과 반환"을 한 메서드로 묶어야
//!    mock이 실제 SQL 한 문장과 같은 동시성 의미를 재현할 수 있음
//!    (low-level get/set으로 쪼개면 mock 쪽에서 CAS 의미가 사라짐)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{
    Asset, Course, NewAsset, NewNotification, Reward, RewardStatusRow, UserAccount, UserReward,
};
use super::Database;
use crate::types::RequirementType;

/// 보상 파이프라인의 영속성 인터페이스
#[async_trait]
pub trait RewardStore: Send + Sync {
    // ============ 보상 카탈로그 ============
    async fn list_rewards(&self) -> Result<Vec<Reward>>;
    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>>;
    async fn get_reward_by_slug(&self, slug: &str) -> Result<Option<Reward>>;

    // ============ 진행 상태 ============
    async fn rewards_with_progress(&self, user_id: Uuid) -> Result<Vec<RewardStatusRow>>;
    async fn bump_progress(
        &self,
        user_id: Uuid,
        category: RequirementType,
        delta: i64,
    ) -> Result<u64>;
    async fn reconcile_progress(
        &self,
        user_id: Uuid,
        category: RequirementType,
        count: i64,
    ) -> Result<()>;
    async fn count_activity(&self, user_id: Uuid, category: RequirementType) -> Result<i64>;

    // ============ 클레임 & 알림 ============
    async fn try_claim(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        progress: i64,
    ) -> Result<Option<UserReward>>;
    async fn advance_notified(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        threshold: i32,
    ) -> Result<bool>;
    async fn insert_notification(&self, notification: &NewNotification) -> Result<()>;

    // ============ 에셋 ============
    async fn insert_pending_asset(&self, asset: &NewAsset) -> Result<bool>;
    async fn confirm_asset(
        &self,
        asset_id: Uuid,
        token_address: &str,
        tx_hash: &str,
        metadata: &serde_json::Value,
    ) -> Result<()>;
    async fn get_asset(&self, asset_id: Uuid) -> Result<Option<Asset>>;
    async fn pending_assets_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Asset>>;
    async fn mark_orphaned(&self, asset_id: Uuid) -> Result<()>;

    // ============ 플랫폼 테이블 (읽기 전용) ============
    async fn list_user_ids(&self) -> Result<Vec<Uuid>>;
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserAccount>>;
    async fn session_user(&self, token: &str) -> Result<Option<UserAccount>>;
    async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>>;
    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool>;
}

// PostgreSQL 구현: db/mod.rs의 Database 메서드에 위임
#[async_trait]
impl RewardStore for Database {
    async fn list_rewards(&self) -> Result<Vec<Reward>> {
        Database::list_rewards(self).await
    }

    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>> {
        Database::get_reward(self, reward_id).await
    }

    async fn get_reward_by_slug(&self, slug: &str) -> Result<Option<Reward>> {
        Database::get_reward_by_slug(self, slug).await
    }

    async fn rewards_with_progress(&self, user_id: Uuid) -> Result<Vec<RewardStatusRow>> {
        Database::rewards_with_progress(self, user_id).await
    }

    async fn bump_progress(
        &self,
        user_id: Uuid,
        category: RequirementType,
        delta: i64,
    ) -> Result<u64> {
        Database::bump_progress(self, user_id, category, delta).await
    }

    async fn reconcile_progress(
        &self,
        user_id: Uuid,
        category: RequirementType,
        count: i64,
    ) -> Result<()> {
        Database::reconcile_progress(self, user_id, category, count).await
    }

    async fn count_activity(&self, user_id: Uuid, category: RequirementType) -> Result<i64> {
        Database::count_activity(self, user_id, category).await
    }

    async fn try_claim(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        progress: i64,
    ) -> Result<Option<UserReward>> {
        Database::try_claim(self, user_id, reward_id, progress).await
    }

    async fn advance_notified(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        threshold: i32,
    ) -> Result<bool> {
        Database::advance_notified(self, user_id, reward_id, threshold).await
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<()> {
        Database::insert_notification(self, notification).await
    }

    async fn insert_pending_asset(&self, asset: &NewAsset) -> Result<bool> {
        Database::insert_pending_asset(self, asset).await
    }

    async fn confirm_asset(
        &self,
        asset_id: Uuid,
        token_address: &str,
        tx_hash: &str,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        Database::confirm_asset(self, asset_id, token_address, tx_hash, metadata).await
    }

    async fn get_asset(&self, asset_id: Uuid) -> Result<Option<Asset>> {
        Database::get_asset(self, asset_id).await
    }

    async fn pending_assets_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Asset>> {
        Database::pending_assets_before(self, cutoff).await
    }

    async fn mark_orphaned(&self, asset_id: Uuid) -> Result<()> {
        Database::mark_orphaned(self, asset_id).await
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
        Database::list_user_ids(self).await
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserAccount>> {
        Database::get_user(self, user_id).await
    }

    async fn session_user(&self, token: &str) -> Result<Option<UserAccount>> {
        Database::session_user(self, token).await
    }

    async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        Database::get_course(self, course_id).await
    }

    async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
        Database::is_enrolled(self, user_id, course_id).await
    }
}

// 테스트용 인메모리 구현
//
// SQL 구현과 같은 의미를 유지해야 하는 지점:
// - try_claim / advance_notified의 CAS 의미
// - pending 에셋의 (user, course) / (user, reward) 유니크 제약
// - 클레임된 행 동결 (bump / reconcile이 건드리지 않음)
#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::types::AssetStatus;
    use chrono::Duration;
    use std::collections::{HashMap, HashSet};
    use std::sync::RwLock;

    pub struct MockRewardStore {
        pub rewards: RwLock<Vec<Reward>>,
        pub user_rewards: RwLock<HashMap<(Uuid, Uuid), UserReward>>,
        pub activity: RwLock<HashMap<(Uuid, RequirementType), i64>>,
        pub assets: RwLock<HashMap<Uuid, Asset>>,
        pub notifications: RwLock<Vec<NewNotification>>,
        pub users: RwLock<HashMap<Uuid, UserAccount>>,
        pub courses: RwLock<HashMap<Uuid, Course>>,
        pub enrollments: RwLock<HashSet<(Uuid, Uuid)>>,
        pub sessions: RwLock<HashMap<String, Uuid>>,
    }

    impl MockRewardStore {
        pub fn new() -> Self {
            Self {
                rewards: RwLock::new(Vec::new()),
                user_rewards: RwLock::new(HashMap::new()),
                activity: RwLock::new(HashMap::new()),
                assets: RwLock::new(HashMap::new()),
                notifications: RwLock::new(Vec::new()),
                users: RwLock::new(HashMap::new()),
                courses: RwLock::new(HashMap::new()),
                enrollments: RwLock::new(HashSet::new()),
                sessions: RwLock::new(HashMap::new()),
            }
        }

        // ============ 테스트 데이터 시드 ============

        pub fn add_reward(&self, reward: Reward) {
            self.rewards.write().unwrap().push(reward);
        }

        pub fn add_user(&self, user: UserAccount) {
            self.users.write().unwrap().insert(user.id, user);
        }

        pub fn add_course(&self, course: Course) {
            self.courses.write().unwrap().insert(course.id, course);
        }

        pub fn enroll(&self, user_id: Uuid, course_id: Uuid) {
            self.enrollments.write().unwrap().insert((user_id, course_id));
        }

        pub fn add_session(&self, token: &str, user_id: Uuid) {
            self.sessions.write().unwrap().insert(token.to_string(), user_id);
        }

        pub fn set_activity(&self, user_id: Uuid, category: RequirementType, count: i64) {
            self.activity.write().unwrap().insert((user_id, category), count);
        }

        /// 에셋 생성 시각을 과거로 되돌림 (스윕 cutoff 테스트용)
        pub fn backdate_asset(&self, asset_id: Uuid, seconds: i64) {
            let mut assets = self.assets.write().unwrap();
            if let Some(asset) = assets.get_mut(&asset_id) {
                asset.created_at = asset.created_at - Duration::seconds(seconds);
            }
        }

        pub fn notification_count(&self) -> usize {
            self.notifications.read().unwrap().len()
        }
    }

    #[async_trait]
    impl RewardStore for MockRewardStore {
        async fn list_rewards(&self) -> Result<Vec<Reward>> {
            Ok(self.rewards.read().unwrap().clone())
        }

        async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>> {
            let rewards = self.rewards.read().unwrap();
            Ok(rewards.iter().find(|r| r.id == reward_id).cloned())
        }

        async fn get_reward_by_slug(&self, slug: &str) -> Result<Option<Reward>> {
            let rewards = self.rewards.read().unwrap();
            Ok(rewards
                .iter()
                .find(|r| r.slug.as_deref() == Some(slug))
                .cloned())
        }

        async fn rewards_with_progress(&self, user_id: Uuid) -> Result<Vec<RewardStatusRow>> {
            let rewards = self.rewards.read().unwrap();
            let user_rewards = self.user_rewards.read().unwrap();

            Ok(rewards
                .iter()
                .map(|r| {
                    let ur = user_rewards.get(&(user_id, r.id));
                    RewardStatusRow {
                        id: r.id,
                        slug: r.slug.clone(),
                        name: r.name.clone(),
                        description: r.description.clone(),
                        requirement_type: r.requirement_type.clone(),
                        requirement: r.requirement,
                        image_url: r.image_url.clone(),
                        grants_nft: r.grants_nft,
                        created_at: r.created_at,
                        progress: ur.map(|u| u.progress).unwrap_or(0),
                        claimed: ur.map(|u| u.claimed).unwrap_or(false),
                        notified_threshold: ur.map(|u| u.notified_threshold).unwrap_or(0),
                    }
                })
                .collect())
        }

        async fn bump_progress(
            &self,
            user_id: Uuid,
            category: RequirementType,
            delta: i64,
        ) -> Result<u64> {
            let rewards = self.rewards.read().unwrap();
            let mut user_rewards = self.user_rewards.write().unwrap();
            let mut touched = 0u64;

            for reward in rewards.iter().filter(|r| r.requirement_type == category.as_str()) {
                match user_rewards.get_mut(&(user_id, reward.id)) {
                    Some(row) if row.claimed => {} // 동결
                    Some(row) => {
                        row.progress = (row.progress as i64 + delta).max(0) as i32;
                        row.updated_at = Utc::now();
                        touched += 1;
                    }
                    None => {
                        user_rewards.insert(
                            (user_id, reward.id),
                            UserReward {
                                user_id,
                                reward_id: reward.id,
                                progress: delta.max(0) as i32,
                                claimed: false,
                                notified_threshold: 0,
                                created_at: Utc::now(),
                                updated_at: Utc::now(),
                            },
                        );
                        touched += 1;
                    }
                }
            }

            Ok(touched)
        }

        async fn reconcile_progress(
            &self,
            user_id: Uuid,
            category: RequirementType,
            count: i64,
        ) -> Result<()> {
            let rewards = self.rewards.read().unwrap();
            let mut user_rewards = self.user_rewards.write().unwrap();

            for reward in rewards.iter().filter(|r| r.requirement_type == category.as_str()) {
                match user_rewards.get_mut(&(user_id, reward.id)) {
                    Some(row) if row.claimed => {}
                    Some(row) => {
                        row.progress = count.max(0) as i32;
                        row.updated_at = Utc::now();
                    }
                    None => {
                        user_rewards.insert(
                            (user_id, reward.id),
                            UserReward {
                                user_id,
                                reward_id: reward.id,
                                progress: count.max(0) as i32,
                                claimed: false,
                                notified_threshold: 0,
                                created_at: Utc::now(),
                                updated_at: Utc::now(),
                            },
                        );
                    }
                }
            }

            Ok(())
        }

        async fn count_activity(&self, user_id: Uuid, category: RequirementType) -> Result<i64> {
            let activity = self.activity.read().unwrap();
            Ok(activity.get(&(user_id, category)).copied().unwrap_or(0))
        }

        async fn try_claim(
            &self,
            user_id: Uuid,
            reward_id: Uuid,
            progress: i64,
        ) -> Result<Option<UserReward>> {
            let mut user_rewards = self.user_rewards.write().unwrap();

            match user_rewards.get_mut(&(user_id, reward_id)) {
                Some(row) if row.claimed => Ok(None),
                Some(row) => {
                    row.claimed = true;
                    row.progress = progress.max(0) as i32;
                    row.updated_at = Utc::now();
                    Ok(Some(row.clone()))
                }
                None => {
                    let row = UserReward {
                        user_id,
                        reward_id,
                        progress: progress.max(0) as i32,
                        claimed: true,
                        notified_threshold: 0,
                        created_at: Utc::now(),
                        updated_at: Utc::now(),
                    };
                    user_rewards.insert((user_id, reward_id), row.clone());
                    Ok(Some(row))
                }
            }
        }

        async fn advance_notified(
            &self,
            user_id: Uuid,
            reward_id: Uuid,
            threshold: i32,
        ) -> Result<bool> {
            let mut user_rewards = self.user_rewards.write().unwrap();

            match user_rewards.get_mut(&(user_id, reward_id)) {
                Some(row) if !row.claimed && row.notified_threshold < threshold => {
                    row.notified_threshold = threshold;
                    row.updated_at = Utc::now();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn insert_notification(&self, notification: &NewNotification) -> Result<()> {
            self.notifications.write().unwrap().push(notification.clone());
            Ok(())
        }

        async fn insert_pending_asset(&self, asset: &NewAsset) -> Result<bool> {
            let mut assets = self.assets.write().unwrap();

            // 부분 유니크 인덱스 재현: (user, course) / (user, reward)당 1행
            let duplicate = assets.values().any(|a| {
                a.user_id == asset.user_id
                    && ((asset.course_id.is_some() && a.course_id == asset.course_id)
                        || (asset.reward_id.is_some() && a.reward_id == asset.reward_id))
            });
            if duplicate {
                return Ok(false);
            }

            assets.insert(
                asset.id,
                Asset {
                    id: asset.id,
                    user_id: asset.user_id,
                    course_id: asset.course_id,
                    reward_id: asset.reward_id,
                    asset_type: asset.asset_type.clone(),
                    collection_name: asset.collection_name.clone(),
                    token_address: None,
                    tx_hash: None,
                    metadata: serde_json::json!({}),
                    status: AssetStatus::Pending.as_str().to_string(),
                    created_at: Utc::now(),
                    confirmed_at: None,
                },
            );

            Ok(true)
        }

        async fn confirm_asset(
            &self,
            asset_id: Uuid,
            token_address: &str,
            tx_hash: &str,
            metadata: &serde_json::Value,
        ) -> Result<()> {
            let mut assets = self.assets.write().unwrap();
            if let Some(asset) = assets.get_mut(&asset_id) {
                asset.status = AssetStatus::Confirmed.as_str().to_string();
                asset.token_address = Some(token_address.to_string());
                asset.tx_hash = Some(tx_hash.to_string());
                asset.metadata = metadata.clone();
                asset.confirmed_at = Some(Utc::now());
            }
            Ok(())
        }

        async fn get_asset(&self, asset_id: Uuid) -> Result<Option<Asset>> {
            Ok(self.assets.read().unwrap().get(&asset_id).cloned())
        }

        async fn pending_assets_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Asset>> {
            let assets = self.assets.read().unwrap();
            let mut pending: Vec<Asset> = assets
                .values()
                .filter(|a| a.status == AssetStatus::Pending.as_str() && a.created_at < cutoff)
                .cloned()
                .collect();
            pending.sort_by_key(|a| a.created_at);
            Ok(pending)
        }

        async fn mark_orphaned(&self, asset_id: Uuid) -> Result<()> {
            let mut assets = self.assets.write().unwrap();
            if let Some(asset) = assets.get_mut(&asset_id) {
                asset.status = AssetStatus::Orphaned.as_str().to_string();
            }
            Ok(())
        }

        async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
            Ok(self.users.read().unwrap().keys().copied().collect())
        }

        async fn get_user(&self, user_id: Uuid) -> Result<Option<UserAccount>> {
            Ok(self.users.read().unwrap().get(&user_id).cloned())
        }

        async fn session_user(&self, token: &str) -> Result<Option<UserAccount>> {
            let sessions = self.sessions.read().unwrap();
            let users = self.users.read().unwrap();
            Ok(sessions
                .get(token)
                .and_then(|user_id| users.get(user_id))
                .cloned())
        }

        async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>> {
            Ok(self.courses.read().unwrap().get(&course_id).cloned())
        }

        async fn is_enrolled(&self, user_id: Uuid, course_id: Uuid) -> Result<bool> {
            Ok(self
                .enrollments
                .read()
                .unwrap()
                .contains(&(user_id, course_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockRewardStore;
    use super::*;

    fn reward(requirement_type: &str) -> Reward {
        Reward {
            id: Uuid::new_v4(),
            slug: None,
            name: "Reward".to_string(),
            description: String::new(),
            requirement_type: requirement_type.to_string(),
            requirement: 5,
            image_url: None,
            grants_nft: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_try_claim_has_single_winner() {
        let store = MockRewardStore::new();
        let user = Uuid::new_v4();
        let r = reward("LIKES");
        store.add_reward(r.clone());

        let first = store.try_claim(user, r.id, 5).await.unwrap();
        assert!(first.is_some());

        let second = store.try_claim(user, r.id, 5).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_advance_notified_moves_forward_only() {
        let store = MockRewardStore::new();
        let user = Uuid::new_v4();
        let r = reward("LIKES");
        store.add_reward(r.clone());
        store
            .bump_progress(user, RequirementType::Likes, 4)
            .await
            .unwrap();

        assert!(store.advance_notified(user, r.id, 75).await.unwrap());
        // 같은 임계값 재시도는 거부
        assert!(!store.advance_notified(user, r.id, 75).await.unwrap());
        // 더 높은 임계값은 허용
        assert!(store.advance_notified(user, r.id, 100).await.unwrap());
        // 뒤로는 못 감
        assert!(!store.advance_notified(user, r.id, 75).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_asset_unique_per_target() {
        let store = MockRewardStore::new();
        let user = Uuid::new_v4();
        let course = Uuid::new_v4();

        let one = NewAsset {
            id: Uuid::new_v4(),
            user_id: user,
            course_id: Some(course),
            reward_id: None,
            asset_type: "course_completion".to_string(),
            collection_name: "Eduverse Achievements".to_string(),
        };
        assert!(store.insert_pending_asset(&one).await.unwrap());

        // 같은 (user, course)는 두 번째 삽입 거부
        let dup = NewAsset {
            id: Uuid::new_v4(),
            ..one.clone()
        };
        assert!(!store.insert_pending_asset(&dup).await.unwrap());

        // 다른 강의는 별개 행
        let other = NewAsset {
            id: Uuid::new_v4(),
            course_id: Some(Uuid::new_v4()),
            ..one.clone()
        };
        assert!(store.insert_pending_asset(&other).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_lookup() {
        let store = MockRewardStore::new();
        let user_id = Uuid::new_v4();
        store.add_user(UserAccount {
            id: user_id,
            display_name: "Alice".to_string(),
            email_verified: true,
            wallet_address: None,
        });
        store.add_session("tok-1", user_id);

        let found = store.session_user("tok-1").await.unwrap();
        assert_eq!(found.unwrap().id, user_id);
        assert!(store.session_user("tok-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_user_ids() {
        let store = MockRewardStore::new();
        assert!(store.list_user_ids().await.unwrap().is_empty());

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for id in [a, b] {
            store.add_user(UserAccount {
                id,
                display_name: "User".to_string(),
                email_verified: false,
                wallet_address: None,
            });
        }

        let mut ids = store.list_user_ids().await.unwrap();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
