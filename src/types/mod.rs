//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 보상 요구사항 카테고리
///
/// # Design Decision
///
/// 카테고리를 닫힌 enum으로 표현하고, 카운트 쿼리를 variant별로 연결:
/// - 새 카테고리 추가 = variant 하나 + 쿼리 하나 (여러 파일 수정 불필요)
/// - 문자열 오타로 인한 런타임 버그를 컴파일 타임에 차단
///
/// DB/와이어 표현은 SCREAMING_SNAKE 문자열 (`POSTS`, `COMMUNITY_JOINS` 등)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementType {
    Posts,
    Likes,
    Comments,
    Follows,
    Enrollments,
    Reviews,
    CommunityJoins,
    CommunityPosts,
    CommunityLikes,
    CommunityComments,
}

impl RequirementType {
    /// 전체 카테고리 (reconciliation 순회용)
    pub const ALL: [RequirementType; 10] = [
        RequirementType::Posts,
        RequirementType::Likes,
        RequirementType::Comments,
        RequirementType::Follows,
        RequirementType::Enrollments,
        RequirementType::Reviews,
        RequirementType::CommunityJoins,
        RequirementType::CommunityPosts,
        RequirementType::CommunityLikes,
        RequirementType::CommunityComments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementType::Posts => "POSTS",
            RequirementType::Likes => "LIKES",
            RequirementType::Comments => "COMMENTS",
            RequirementType::Follows => "FOLLOWS",
            RequirementType::Enrollments => "ENROLLMENTS",
            RequirementType::Reviews => "REVIEWS",
            RequirementType::CommunityJoins => "COMMUNITY_JOINS",
            RequirementType::CommunityPosts => "COMMUNITY_POSTS",
            RequirementType::CommunityLikes => "COMMUNITY_LIKES",
            RequirementType::CommunityComments => "COMMUNITY_COMMENTS",
        }
    }

    /// variant별 source-of-truth 카운트 쿼리 (reconciliation 경로)
    ///
    /// 모든 쿼리는 `$1` = user id 하나만 바인딩
    pub fn count_query(&self) -> &'static str {
        match self {
            RequirementType::Posts => "SELECT COUNT(*) FROM posts WHERE author_id = $1",
            RequirementType::Likes => "SELECT COUNT(*) FROM likes WHERE user_id = $1",
            RequirementType::Comments => "SELECT COUNT(*) FROM comments WHERE author_id = $1",
            RequirementType::Follows => "SELECT COUNT(*) FROM follows WHERE follower_id = $1",
            RequirementType::Enrollments => "SELECT COUNT(*) FROM enrollments WHERE user_id = $1",
            RequirementType::Reviews => "SELECT COUNT(*) FROM reviews WHERE author_id = $1",
            RequirementType::CommunityJoins => {
                "SELECT COUNT(*) FROM community_members WHERE user_id = $1"
            }
            RequirementType::CommunityPosts => {
                "SELECT COUNT(*) FROM community_posts WHERE author_id = $1"
            }
            RequirementType::CommunityLikes => {
                "SELECT COUNT(*) FROM community_likes WHERE user_id = $1"
            }
            RequirementType::CommunityComments => {
                "SELECT COUNT(*) FROM community_comments WHERE author_id = $1"
            }
        }
    }
}

impl FromStr for RequirementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequirementType::ALL
            .iter()
            .find(|rt| rt.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown requirement type: {}", s))
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 민팅된 NFT 레코드의 라이프사이클 상태
///
/// `pending` → 체인 호출 전에 durable하게 기록 (idempotency 게이트 겸용)
/// `confirmed` → transfer까지 확인된 후
/// `orphaned` → 스윕이 포기한 행 (운영자 확인 필요)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Pending,
    Confirmed,
    Orphaned,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Pending => "pending",
            AssetStatus::Confirmed => "confirmed",
            AssetStatus::Orphaned => "orphaned",
        }
    }
}

/// 체인 지갑 주소 타입
///
/// `0x` + 1~64자리 hex (짧은 주소는 leading zero 생략형)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn new(addr: &str) -> Result<Self, String> {
        let addr = addr.trim().to_lowercase();
        let hex_part = match addr.strip_prefix("0x") {
            Some(h) => h,
            None => return Err("Wallet address must start with 0x".to_string()),
        };
        if hex_part.is_empty() || hex_part.len() > 64 {
            return Err("Wallet address must be 1-64 hex characters".to_string());
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("Wallet address must be hex".to_string());
        }
        Ok(Self(addr))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_type_round_trip() {
        for rt in RequirementType::ALL {
            assert_eq!(rt.as_str().parse::<RequirementType>(), Ok(rt));
        }
    }

    #[test]
    fn test_requirement_type_unknown() {
        assert!("BADGES".parse::<RequirementType>().is_err());
        // 소문자는 와이어 표현이 아님
        assert!("likes".parse::<RequirementType>().is_err());
    }

    #[test]
    fn test_count_queries_are_distinct() {
        // variant마다 전용 쿼리가 있어야 함 (복붙 실수 방지)
        let mut queries: Vec<&str> = RequirementType::ALL
            .iter()
            .map(|rt| rt.count_query())
            .collect();
        queries.sort();
        queries.dedup();
        assert_eq!(queries.len(), RequirementType::ALL.len());
    }

    #[test]
    fn test_requirement_type_serde() {
        let json = serde_json::to_string(&RequirementType::CommunityJoins).unwrap();
        assert_eq!(json, "\"COMMUNITY_JOINS\"");
        let back: RequirementType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RequirementType::CommunityJoins);
    }

    #[test]
    fn test_wallet_address_valid() {
        assert!(WalletAddress::new("0x1").is_ok());
        let full = WalletAddress::new(&format!("0x{}", "ab".repeat(32)));
        assert!(full.is_ok());
    }

    #[test]
    fn test_wallet_address_invalid() {
        assert!(WalletAddress::new("abc").is_err());
        assert!(WalletAddress::new("0x").is_err());
        assert!(WalletAddress::new(&format!("0x{}", "ab".repeat(33))).is_err());
        assert!(WalletAddress::new("0xzz").is_err());
    }

    #[test]
    fn test_wallet_address_normalizes_case() {
        let addr = WalletAddress::new("0xABCDEF").unwrap();
        assert_eq!(addr.as_str(), "0xabcdef");
    }
}
