//! Claim/Mint Orchestrator
//!
//! # Interview Q&A
//!
//! Q: 동시에 두 요청이 같은 보상을 클레임하면?
//! A: CAS 게이트가 한 쪽만 통과시킴
//!    - try_claim은 "claimed=false → true" 조건부 upsert 한 문장
//!    - 게이트를 통과한 요청만 민팅 부수효과에 진입
//!    - 패자는 400 "already claimed"를 받음 (재시도해도 결과 동일)
//!
//! Q: 민팅이 왜 two-phase인가?
//! A: 체인 호출은 느리고 실패할 수 있음
//!    - phase 1: 체인 호출 **전에** pending 행을 durable하게 삽입
//!      → (user, course)/(user, reward) 유니크 인덱스가 중복 민팅 차단
//!    - phase 2: mint + transfer가 끝난 뒤에만 confirmed로 전환
//!    - 중간에 죽으면 pending 행이 남고, 스윕이 이어받아 재시도
//!    - "confirmed인데 토큰이 없는" 레코드는 존재할 수 없음
//!
//! Q: 컬렉션 생성 실패는 왜 무시하는가?
//! A: create-if-missing 의미라서
//!    - 두 번째 민팅부터는 항상 "이미 존재" 에러 → 정상 경로
//!    - 컬렉션이 정말 없으면 다음 단계(mint)가 어차피 실패함

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::cache::RewardCache;
use super::chain::{ChainClient, MintedToken};
use crate::db::{Asset, Course, NewAsset, Reward, RewardStore, UserReward};
use crate::error::ApiError;
use crate::types::WalletAddress;

pub const ASSET_TYPE_COURSE: &str = "course_completion";
pub const ASSET_TYPE_REWARD: &str = "reward";

/// 가입 보상의 고정 slug (시드 마이그레이션으로 존재 보장)
pub const WELCOME_SLUG: &str = "welcome";

const COLLECTION_DESCRIPTION: &str = "Achievement NFTs for the Eduverse learning platform";
const COLLECTION_URI: &str = "https://eduverse.example/nft";

/// 클레임/민팅 오케스트레이터
pub struct MintService {
    store: Arc<dyn RewardStore>,
    chain: Arc<dyn ChainClient>,
    cache: Arc<RewardCache>,
    collection_name: String,
}

/// 민팅 완료 결과
#[derive(Debug)]
pub struct MintOutcome {
    pub asset: Asset,
    pub token_name: String,
    pub token_address: String,
    pub tx_hash: String,
}

/// 클레임 결과 (NFT 보상이면 minted 포함)
#[derive(Debug)]
pub struct ClaimOutcome {
    pub user_reward: UserReward,
    pub minted: Option<MintOutcome>,
}

/// pending 스윕 결과
#[derive(Debug)]
pub struct SweepReport {
    pub retried: u32,
    pub confirmed: u32,
    pub orphaned: u32,
}

/// 민팅할 토큰의 파라미터
struct TokenSpec {
    name: String,
    description: String,
    uri: String,
    extra: serde_json::Value,
}

impl MintService {
    pub fn new(
        store: Arc<dyn RewardStore>,
        chain: Arc<dyn ChainClient>,
        cache: Arc<RewardCache>,
        collection_name: &str,
    ) -> Self {
        Self {
            store,
            chain,
            cache,
            collection_name: collection_name.to_string(),
        }
    }

    /// 보상 클레임
    ///
    /// 검증 순서: 보상 존재 → 진행도 충족 → (NFT면) 지갑 존재 →
    /// CAS 게이트 → 민팅. 각 단계는 구분되는 에러로 중단됨
    pub async fn claim_reward(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
    ) -> Result<ClaimOutcome, ApiError> {
        let reward = self
            .store
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Reward".to_string()))?;

        let category = match reward.category() {
            Ok(category) => category,
            Err(err) => {
                tracing::error!("Reward {} has invalid category: {}", reward.id, err);
                return Err(ApiError::InternalError);
            }
        };

        // 검증은 증분 카운터가 아니라 source-of-truth 카운트 기준
        let progress = self.store.count_activity(user_id, category).await?;
        if progress < reward.requirement as i64 {
            return Err(ApiError::RequirementsNotMet(format!(
                "Reward requires {} {}, current progress is {}",
                reward.requirement, reward.requirement_type, progress
            )));
        }

        // NFT 보상은 부수효과 전에 지갑부터 확인 (게이트를 헛되이 소모하지 않음)
        let wallet = if reward.grants_nft {
            Some(self.recipient_wallet(user_id).await?)
        } else {
            None
        };

        // CAS 게이트: 통과한 요청만 민팅 부수효과 진입
        let user_reward = self
            .store
            .try_claim(user_id, reward_id, progress)
            .await?
            .ok_or(ApiError::AlreadyClaimed)?;
        self.cache.invalidate(user_id);

        let minted = match wallet {
            Some(wallet) => {
                let new_asset = NewAsset {
                    id: Uuid::new_v4(),
                    user_id,
                    course_id: None,
                    reward_id: Some(reward.id),
                    asset_type: ASSET_TYPE_REWARD.to_string(),
                    collection_name: self.collection_name.clone(),
                };
                let spec = Self::reward_token_spec(&reward);
                Some(self.run_mint(new_asset, spec, &wallet).await?)
            }
            None => None,
        };

        Ok(ClaimOutcome {
            user_reward,
            minted,
        })
    }

    /// 가입 보상 클레임 (slug 고정 조회 후 일반 클레임 경로)
    pub async fn claim_welcome(&self, user_id: Uuid) -> Result<ClaimOutcome, ApiError> {
        let reward = self
            .store
            .get_reward_by_slug(WELCOME_SLUG)
            .await?
            .ok_or_else(|| ApiError::NotFound("Welcome reward".to_string()))?;
        self.claim_reward(user_id, reward.id).await
    }

    /// 강의 수료 NFT 민팅
    pub async fn mint_course_nft(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> Result<MintOutcome, ApiError> {
        // 지갑이 없으면 어떤 부수효과도 없이 실패
        let wallet = self.recipient_wallet(user_id).await?;

        let course = self
            .store
            .get_course(course_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Course".to_string()))?;

        if !self.store.is_enrolled(user_id, course_id).await? {
            return Err(ApiError::NotEnrolled);
        }

        let new_asset = NewAsset {
            id: Uuid::new_v4(),
            user_id,
            course_id: Some(course_id),
            reward_id: None,
            asset_type: ASSET_TYPE_COURSE.to_string(),
            collection_name: self.collection_name.clone(),
        };
        self.run_mint(new_asset, Self::course_token_spec(&course), &wallet)
            .await
    }

    /// max_age보다 오래된 pending 에셋 재처리
    ///
    /// 성공 → confirmed, 또 실패 → orphaned (자동 재시도 대상에서 제외,
    /// 운영자 확인 필요). 방금 생긴 pending은 본래 요청이 아직 진행 중일 수
    /// 있으므로 건드리지 않음
    pub async fn reconcile_pending(&self, max_age: Duration) -> Result<SweepReport> {
        let cutoff = Utc::now() - max_age;
        let pending = self.store.pending_assets_before(cutoff).await?;

        let mut report = SweepReport {
            retried: 0,
            confirmed: 0,
            orphaned: 0,
        };

        for asset in pending {
            report.retried += 1;
            match self.retry_pending_asset(&asset).await {
                Ok(()) => {
                    report.confirmed += 1;
                    tracing::info!("Pending asset {} confirmed by sweep", asset.id);
                }
                Err(err) => {
                    tracing::error!("Sweep gave up on asset {}: {:#}", asset.id, err);
                    self.store.mark_orphaned(asset.id).await?;
                    report.orphaned += 1;
                }
            }
        }

        Ok(report)
    }

    // ============ 내부 파이프라인 ============

    /// 수신자 지갑 확인 (NFT 플로우 공통 선행 조건)
    async fn recipient_wallet(&self, user_id: Uuid) -> Result<WalletAddress, ApiError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User".to_string()))?;

        let raw = match user.wallet_address {
            Some(wallet) if !wallet.trim().is_empty() => wallet,
            _ => return Err(ApiError::WalletMissing),
        };
        WalletAddress::new(&raw).map_err(ApiError::ValidationError)
    }

    /// two-phase 민팅: pending 삽입 → 체인 파이프라인 → confirmed 전환
    async fn run_mint(
        &self,
        new_asset: NewAsset,
        spec: TokenSpec,
        recipient: &WalletAddress,
    ) -> Result<MintOutcome, ApiError> {
        // phase 1: pending 행 = 멱등성 게이트 (체인 호출 전에 durable)
        if !self.store.insert_pending_asset(&new_asset).await? {
            return Err(ApiError::AlreadyMinted);
        }

        match self.mint_and_transfer(&spec, recipient).await {
            Ok(minted) => {
                // phase 2: transfer까지 확인된 뒤에만 confirmed
                let metadata = self.build_metadata(&spec, recipient);
                self.store
                    .confirm_asset(new_asset.id, &minted.token_address, &minted.tx_hash, &metadata)
                    .await?;

                let asset = self
                    .store
                    .get_asset(new_asset.id)
                    .await?
                    .ok_or(ApiError::InternalError)?;

                Ok(MintOutcome {
                    asset,
                    token_name: spec.name,
                    token_address: minted.token_address,
                    tx_hash: minted.tx_hash,
                })
            }
            Err(err) => {
                // pending 행은 남겨둠. 스윕이 이어받음
                tracing::error!(
                    "Mint pipeline failed for asset {} (stays pending): {:#}",
                    new_asset.id,
                    err
                );
                Err(ApiError::MintFailed(format!("{:#}", err)))
            }
        }
    }

    /// 체인 파이프라인: 컬렉션 보장(best-effort) → mint → transfer
    async fn mint_and_transfer(
        &self,
        spec: &TokenSpec,
        recipient: &WalletAddress,
    ) -> Result<MintedToken> {
        if let Err(err) = self
            .chain
            .create_collection(&self.collection_name, COLLECTION_DESCRIPTION, COLLECTION_URI)
            .await
        {
            tracing::debug!("Collection create skipped: {:#}", err);
        }

        let minted = self
            .chain
            .mint_token(&self.collection_name, &spec.name, &spec.description, &spec.uri)
            .await
            .context("Token mint failed")?;

        self.chain
            .transfer_token(&minted.token_address, recipient.as_str())
            .await
            .context("Token transfer failed")?;

        Ok(minted)
    }

    /// pending 에셋 재처리: 원래 민팅 파라미터를 복원해 같은 파이프라인 실행
    async fn retry_pending_asset(&self, asset: &Asset) -> Result<()> {
        let user = self
            .store
            .get_user(asset.user_id)
            .await?
            .context("User no longer exists")?;
        let raw = user.wallet_address.context("User has no wallet address")?;
        let wallet = WalletAddress::new(&raw).map_err(|e| anyhow!(e))?;

        let spec = match (asset.course_id, asset.reward_id) {
            (Some(course_id), _) => {
                let course = self
                    .store
                    .get_course(course_id)
                    .await?
                    .context("Course no longer exists")?;
                Self::course_token_spec(&course)
            }
            (None, Some(reward_id)) => {
                let reward = self
                    .store
                    .get_reward(reward_id)
                    .await?
                    .context("Reward no longer exists")?;
                Self::reward_token_spec(&reward)
            }
            (None, None) => bail!("Asset references neither course nor reward"),
        };

        let minted = self.mint_and_transfer(&spec, &wallet).await?;
        let metadata = self.build_metadata(&spec, &wallet);
        self.store
            .confirm_asset(asset.id, &minted.token_address, &minted.tx_hash, &metadata)
            .await?;
        Ok(())
    }

    fn reward_token_spec(reward: &Reward) -> TokenSpec {
        TokenSpec {
            name: reward.name.clone(),
            description: reward.description.clone(),
            uri: reward.image_url.clone().unwrap_or_default(),
            extra: json!({ "rewardId": reward.id }),
        }
    }

    fn course_token_spec(course: &Course) -> TokenSpec {
        TokenSpec {
            name: format!("{} - Completion Certificate", course.title),
            description: format!("Certifies completion of the course '{}'", course.title),
            uri: course.image_url.clone().unwrap_or_default(),
            extra: json!({ "courseId": course.id }),
        }
    }

    /// 민팅 당시 파라미터의 스냅샷 (assets.metadata로 저장)
    fn build_metadata(&self, spec: &TokenSpec, recipient: &WalletAddress) -> serde_json::Value {
        let mut metadata = json!({
            "collection": self.collection_name,
            "name": spec.name,
            "description": spec.description,
            "uri": spec.uri,
            "recipient": recipient.as_str(),
        });
        if let (Some(target), Some(extra)) = (metadata.as_object_mut(), spec.extra.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        metadata
    }
}
