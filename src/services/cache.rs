//! Reward List Cache
//!
//! # Interview Q&A
//!
//! Q: 왜 Redis가 아니라 인프로세스 캐시인가?
//! A: 캐시 대상이 "사용자별 보상 목록" 하나뿐이고 단일 인스턴스 배포
//!    - 프로세스 메모리 + RwLock으로 충분
//!    - 네트워크 왕복/운영 부담 없음
//!    - 멀티 인스턴스로 가면 invalidate가 전파되지 않으므로
//!      그 시점에 Redis로 교체 (인터페이스는 동일하게 유지)
//!
//! Q: 캐시 일관성 전략은?
//! A: cache-aside + invalidate-on-write
//!    - 읽기: 캐시 미스 시 DB 조회 후 TTL과 함께 저장
//!    - 쓰기(진행도 변경, 클레임): 해당 사용자 키를 즉시 무효화
//!    - TTL은 무효화가 누락됐을 때의 안전망
//!    - 스탬피드 방어는 없음: 미스가 몰리면 같은 쿼리가 중복 실행될 수
//!      있으나 쿼리가 가볍고 키가 사용자 단위라 허용

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::db::RewardStatusRow;

/// 사용자별 보상 목록 캐시 (TTL + 명시적 무효화)
pub struct RewardCache {
    ttl: Duration,
    entries: RwLock<HashMap<Uuid, CacheEntry>>,
}

struct CacheEntry {
    rows: Vec<RewardStatusRow>,
    cached_at: Instant,
}

impl RewardCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 캐시 조회. 만료된 항목은 미스로 처리
    pub fn get(&self, user_id: Uuid) -> Option<Vec<RewardStatusRow>> {
        let entries = self.entries.read().unwrap();
        entries.get(&user_id).and_then(|entry| {
            if entry.cached_at.elapsed() < self.ttl {
                Some(entry.rows.clone())
            } else {
                None
            }
        })
    }

    /// 캐시 저장
    pub fn put(&self, user_id: Uuid, rows: Vec<RewardStatusRow>) {
        let mut entries = self.entries.write().unwrap();

        // 만료된 항목이 쌓이지 않도록 쓰기 시점에 정리
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.cached_at.elapsed() < ttl);

        entries.insert(
            user_id,
            CacheEntry {
                rows,
                cached_at: Instant::now(),
            },
        );
    }

    /// 사용자 키 무효화 (진행도 변경/클레임 직후 호출)
    pub fn invalidate(&self, user_id: Uuid) {
        let mut entries = self.entries.write().unwrap();
        entries.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_rows(progress: i32) -> Vec<RewardStatusRow> {
        vec![RewardStatusRow {
            id: Uuid::new_v4(),
            slug: None,
            name: "First Post".to_string(),
            description: "Write your first post".to_string(),
            requirement_type: "POSTS".to_string(),
            requirement: 1,
            image_url: None,
            grants_nft: false,
            created_at: Utc::now(),
            progress,
            claimed: false,
            notified_threshold: 0,
        }]
    }

    #[test]
    fn test_cache_hit() {
        let cache = RewardCache::new(60);
        let user_id = Uuid::new_v4();

        assert!(cache.get(user_id).is_none());

        cache.put(user_id, sample_rows(3));
        let rows = cache.get(user_id).unwrap();
        assert_eq!(rows[0].progress, 3);
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = RewardCache::new(60);
        let user_id = Uuid::new_v4();

        cache.put(user_id, sample_rows(3));
        cache.invalidate(user_id);
        assert!(cache.get(user_id).is_none());
    }

    #[test]
    fn test_cache_expiry() {
        // TTL 0 → 저장 즉시 만료
        let cache = RewardCache::new(0);
        let user_id = Uuid::new_v4();

        cache.put(user_id, sample_rows(3));
        assert!(cache.get(user_id).is_none());
    }

    #[test]
    fn test_cache_keys_are_per_user() {
        let cache = RewardCache::new(60);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        cache.put(alice, sample_rows(5));
        cache.invalidate(bob);

        // 다른 사용자 무효화는 영향 없음
        assert_eq!(cache.get(alice).unwrap()[0].progress, 5);
        assert!(cache.get(bob).is_none());
    }
}
