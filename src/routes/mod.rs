//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/api/rewards` - 보상 카탈로그 + 진행 상태
//! - `/api/rewards/progress` - 활동 반영
//! - `/api/rewards/claim` - 보상 클레임 (NFT 보상이면 민팅까지)
//! - `/api/rewards/check-progress` - 전체 사용자 진행도 재계산 (배치)
//! - `/api/nft/mint` - 강의 수료 NFT 민팅
//! - `/api/nft/welcome` - 가입 기념 NFT
//! - `/api/nft/reconcile` - pending 에셋 스윕 (크론)

pub mod health;
pub mod nft;
pub mod rewards;
