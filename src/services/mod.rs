//! 비즈니스 로직 서비스 레이어
//!
//! 라우트 핸들러는 여기 있는 서비스만 호출하고, 서비스가 저장소/체인을 조합함

pub mod cache;
pub mod chain;
pub mod minter;
pub mod notify;
pub mod progress;
pub mod retry;

pub use cache::RewardCache;
pub use chain::{ChainClient, FullnodeClient, MintedToken};
pub use minter::{ClaimOutcome, MintOutcome, MintService, SweepReport};
pub use notify::{Notifier, KIND_REWARD_PROGRESS};
pub use progress::ProgressEngine;
pub use retry::{submit_with_retry, RetryPolicy};
