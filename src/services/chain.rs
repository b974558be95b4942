//! Chain Client
//!
//! # Interview Q&A
//!
//! Q: SDK 대신 풀노드 REST API를 직접 쓰는 이유는?
//! A: 이 서비스가 쓰는 체인 기능은 세 가지뿐
//!    (컬렉션 생성, 민팅, 오브젝트 전송)
//!    - 노드의 /transactions/encode_submission이 BCS 직렬화를 대행
//!      → 클라이언트는 ed25519 서명만 하면 됨
//!    - reqwest + 서명 키만으로 전체 플로우 구현 가능
//!
//! Q: 계정 주소는 어떻게 유도되는가?
//! A: single-key 스킴: address = sha3-256(pubkey || 0x00)
//!    - 0x00은 ed25519 single-key 스킴 식별자
//!    - 개인키(hex)만 설정하면 주소는 코드가 유도
//!
//! Q: 민팅된 토큰의 주소는 어떻게 알아내는가?
//! A: 민팅 트랜잭션 자신의 이벤트 로그에서 읽음
//!    - 토큰은 오브젝트로 생성되고 주소는 실행 시점에 결정됨
//!    - 발행 계정의 보유 토큰 목록을 스캔하는 방식은 동시 민팅 시
//!      남의 토큰을 집을 수 있음. 이벤트 로그는 해당 트랜잭션에
//!      귀속되므로 경합이 없음

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde_json::{json, Value};
use sha3::{Digest, Sha3_256};
use std::time::Duration;

use super::retry::submit_with_retry;

// ============ 체인 상수 ============

const CREATE_COLLECTION_FN: &str = "0x4::aptos_token::create_collection";
const MINT_FN: &str = "0x4::aptos_token::mint";
const TRANSFER_FN: &str = "0x1::object::transfer";
const TOKEN_TYPE: &str = "0x4::token::Token";

/// 민팅 이벤트 타입 suffix (프레임워크 버전에 따라 Mint/MintEvent)
const MINT_EVENT_SUFFIXES: [&str; 2] = ["::collection::Mint", "::collection::MintEvent"];

const SUBMIT_ATTEMPTS: u32 = 3;
const SUBMIT_RETRY_DELAY: Duration = Duration::from_secs(1);
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);
const CONFIRM_POLL_LIMIT: u32 = 30;
const TX_EXPIRATION_SECS: u64 = 600;
const MAX_GAS_AMOUNT: &str = "100000";
const GAS_UNIT_PRICE: &str = "100";

/// 민팅 결과: 새 토큰의 체인 주소 + 민팅 트랜잭션 해시
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token_address: String,
    pub tx_hash: String,
}

/// 체인 상호작용 인터페이스
///
/// 프로덕션: FullnodeClient / 테스트: mock::MockChainClient
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// 플랫폼 계정 명의의 컬렉션 생성
    ///
    /// 이미 존재하면 Err. 호출부가 best-effort로 처리
    async fn create_collection(&self, name: &str, description: &str, uri: &str)
        -> Result<String>;

    /// 토큰 1개 민팅, 이벤트 로그에서 토큰 주소 식별
    async fn mint_token(
        &self,
        collection: &str,
        name: &str,
        description: &str,
        uri: &str,
    ) -> Result<MintedToken>;

    /// 토큰 오브젝트를 수신자 지갑으로 전송
    async fn transfer_token(&self, token_address: &str, recipient: &str) -> Result<String>;
}

/// 풀노드 REST API 클라이언트
///
/// 모든 트랜잭션은 플랫폼 계정이 서명:
/// 시퀀스 조회 → encode_submission → ed25519 서명 → 제출 → 확정 대기
pub struct FullnodeClient {
    http: reqwest::Client,
    node_url: String,
    signing_key: SigningKey,
    account_address: String,
}

impl FullnodeClient {
    pub fn new(node_url: &str, private_key_hex: &str) -> Result<Self> {
        let key_bytes = hex::decode(private_key_hex.trim_start_matches("0x"))
            .context("PLATFORM_PRIVATE_KEY must be hex")?;
        let key_array: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("PLATFORM_PRIVATE_KEY must be 32 bytes"))?;
        let signing_key = SigningKey::from_bytes(&key_array);
        let account_address = derive_address(&signing_key.verifying_key());

        Ok(Self {
            http: reqwest::Client::new(),
            node_url: node_url.trim_end_matches('/').to_string(),
            signing_key,
            account_address,
        })
    }

    /// 플랫폼 계정 주소 (0x + 64 hex)
    pub fn account_address(&self) -> &str {
        &self.account_address
    }

    /// 현재 시퀀스 넘버 조회
    ///
    /// 매 제출 시도 직전에 호출됨. 캐시하면 stale sequence의 원인이 됨
    async fn sequence_number(&self) -> Result<u64> {
        let url = format!("{}/accounts/{}", self.node_url, self.account_address);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Account lookup failed ({}): {}", status, body);
        }

        let account: Value = resp.json().await?;
        account["sequence_number"]
            .as_str()
            .context("Account response missing sequence_number")?
            .parse::<u64>()
            .context("Invalid sequence_number")
    }

    /// entry function 트랜잭션 1회 제출 (서명 → 제출 → 확정 대기)
    async fn submit_entry_function(
        &self,
        function: &str,
        type_arguments: Vec<String>,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        // 시퀀스 넘버는 서명 직전에 조회
        let sequence_number = self.sequence_number().await?;
        let expiration = Utc::now().timestamp() as u64 + TX_EXPIRATION_SECS;

        let mut tx = json!({
            "sender": self.account_address,
            "sequence_number": sequence_number.to_string(),
            "max_gas_amount": MAX_GAS_AMOUNT,
            "gas_unit_price": GAS_UNIT_PRICE,
            "expiration_timestamp_secs": expiration.to_string(),
            "payload": {
                "type": "entry_function_payload",
                "function": function,
                "type_arguments": type_arguments,
                "arguments": arguments,
            }
        });

        // 노드가 BCS 서명 메시지를 인코딩해줌
        let encode_url = format!("{}/transactions/encode_submission", self.node_url);
        let resp = self.http.post(&encode_url).json(&tx).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Signing message encoding failed ({}): {}", status, body);
        }
        let signing_message: String = resp.json().await?;
        let message_bytes = hex::decode(signing_message.trim_start_matches("0x"))
            .context("Invalid signing message from node")?;

        let signature = self.signing_key.sign(&message_bytes);
        tx["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": format!(
                "0x{}",
                hex::encode(self.signing_key.verifying_key().as_bytes())
            ),
            "signature": format!("0x{}", hex::encode(signature.to_bytes())),
        });

        let submit_url = format!("{}/transactions", self.node_url);
        let resp = self.http.post(&submit_url).json(&tx).send().await?;
        if !resp.status().is_success() {
            // 거부 사유(SEQUENCE_NUMBER_TOO_OLD 등)는 본문에 있음.
            // 재시도 판별이 이 메시지에 의존하므로 그대로 담아 전파
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Transaction submission failed ({}): {}", status, body);
        }

        let pending: Value = resp.json().await?;
        let tx_hash = pending["hash"]
            .as_str()
            .context("Submission response missing hash")?
            .to_string();

        self.wait_for_transaction(&tx_hash).await
    }

    /// 트랜잭션 확정 폴링
    async fn wait_for_transaction(&self, tx_hash: &str) -> Result<Value> {
        let url = format!("{}/transactions/by_hash/{}", self.node_url, tx_hash);

        for _ in 0..CONFIRM_POLL_LIMIT {
            let resp = self.http.get(&url).send().await?;

            // 404 = 아직 mempool 인덱싱 전
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
                continue;
            }

            let tx: Value = resp.error_for_status()?.json().await?;
            if tx["type"].as_str() == Some("pending_transaction") {
                tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
                continue;
            }

            if tx["success"].as_bool() == Some(true) {
                return Ok(tx);
            }
            bail!(
                "Transaction {} failed on-chain: {}",
                tx_hash,
                tx["vm_status"].as_str().unwrap_or("unknown")
            );
        }

        bail!("Transaction {} not confirmed in time", tx_hash)
    }

    /// 시퀀스 경합 재시도를 걸고 제출
    async fn submit_with_sequence_retry(
        &self,
        function: &str,
        type_arguments: Vec<String>,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        submit_with_retry(SUBMIT_ATTEMPTS, SUBMIT_RETRY_DELAY, || {
            self.submit_entry_function(function, type_arguments.clone(), arguments.clone())
        })
        .await
    }
}

#[async_trait]
impl ChainClient for FullnodeClient {
    async fn create_collection(
        &self,
        name: &str,
        description: &str,
        uri: &str,
    ) -> Result<String> {
        let arguments = vec![
            json!(description),
            json!(u64::MAX.to_string()), // max_supply: 무제한
            json!(name),
            json!(uri),
            json!(true), // mutable_description
            json!(true), // mutable_royalty
            json!(true), // mutable_uri
            json!(true), // mutable_token_description
            json!(true), // mutable_token_name
            json!(true), // mutable_token_properties
            json!(true), // mutable_token_uri
            json!(true), // tokens_burnable_by_creator
            json!(true), // tokens_freezable_by_creator
            json!("0"),  // royalty_numerator
            json!("1"),  // royalty_denominator
        ];

        let tx = self
            .submit_with_sequence_retry(CREATE_COLLECTION_FN, vec![], arguments)
            .await?;

        let tx_hash = tx["hash"]
            .as_str()
            .context("Collection transaction missing hash")?
            .to_string();
        tracing::info!("Collection '{}' created: {}", name, tx_hash);
        Ok(tx_hash)
    }

    async fn mint_token(
        &self,
        collection: &str,
        name: &str,
        description: &str,
        uri: &str,
    ) -> Result<MintedToken> {
        let arguments = vec![
            json!(collection),
            json!(description),
            json!(name),
            json!(uri),
            json!([]), // property_keys
            json!([]), // property_types
            json!([]), // property_values
        ];

        let tx = self
            .submit_with_sequence_retry(MINT_FN, vec![], arguments)
            .await?;

        let tx_hash = tx["hash"]
            .as_str()
            .context("Mint transaction missing hash")?
            .to_string();
        let token_address = token_address_from_mint(&tx)?;

        tracing::info!("Token '{}' minted at {}: {}", name, token_address, tx_hash);
        Ok(MintedToken {
            token_address,
            tx_hash,
        })
    }

    async fn transfer_token(&self, token_address: &str, recipient: &str) -> Result<String> {
        let tx = self
            .submit_with_sequence_retry(
                TRANSFER_FN,
                vec![TOKEN_TYPE.to_string()],
                vec![json!(token_address), json!(recipient)],
            )
            .await?;

        let tx_hash = tx["hash"]
            .as_str()
            .context("Transfer transaction missing hash")?
            .to_string();
        tracing::info!("Token {} transferred to {}: {}", token_address, recipient, tx_hash);
        Ok(tx_hash)
    }
}

/// single-key 스킴 주소 유도: sha3-256(pubkey || 0x00)
fn derive_address(public_key: &VerifyingKey) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key.as_bytes());
    hasher.update([0x00u8]);
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// 민팅 트랜잭션의 이벤트 로그에서 새 토큰 주소 추출
fn token_address_from_mint(tx: &Value) -> Result<String> {
    let events = tx["events"]
        .as_array()
        .context("Mint transaction has no events")?;

    for event in events {
        let event_type = event["type"].as_str().unwrap_or("");
        if MINT_EVENT_SUFFIXES.iter().any(|s| event_type.ends_with(s)) {
            if let Some(token) = event["data"]["token"].as_str() {
                return Ok(token.to_string());
            }
        }
    }

    bail!("No mint event in transaction {}", tx["hash"].as_str().unwrap_or("?"))
}
