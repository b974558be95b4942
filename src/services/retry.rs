//! Retry Helpers
//!
//! # Interview Q&A
//!
//! Q: 재시도 정책이 두 개인 이유는?
//! A: 재시도 대상이 다르기 때문
//!
//!    1. RetryPolicy: 모든 에러를 고정 간격으로 재시도 (상한 있음)
//!       - 대상: DB read-replica 지연, 일시적 커넥션 실패
//!       - 사용처: 세션 조회, 진행도 업데이트 라우트
//!
//!    2. submit_with_retry: 시퀀스 넘버 경합**만** 재시도
//!       - 체인 트랜잭션은 멱등하지 않음. VM 실행 실패를 무차별
//!         재시도하면 같은 실패를 반복하며 가스만 소모
//!       - 시퀀스 넘버 staleness는 유일하게 안전한 재시도 사유
//!         (제출 자체가 거부되므로 체인 상태 변화 없음)
//!
//! Q: 무한 재시도를 두지 않는 이유는?
//! A: 상한 없는 재시도는 장애를 전파함
//!    - 이 서비스의 모든 재시도는 고정 횟수 + 고정 지연, 초과 시 전파

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

/// 고정 간격, 고정 횟수 재시도 정책
///
/// 모든 에러를 재시도 대상으로 본다. 쓰기/읽기 사이의
/// eventual-consistency 윈도우를 흡수하는 용도
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// op를 최대 attempts회 실행, 마지막 실패는 그대로 전파
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts => {
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying: {:#}",
                        label,
                        attempt,
                        self.attempts,
                        err
                    );
                    tokio::time::sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// 체인 제출 전용 combinator: 시퀀스 넘버 경합에만 재시도
///
/// submit 클로저는 호출될 때마다 시퀀스 넘버를 **새로 조회**해야 함.
/// 같은 서명을 다시 제출하는 건 같은 실패를 반복할 뿐이다.
/// 경합이 아닌 실패는 첫 시도에서 그대로 전파됨
pub async fn submit_with_retry<T, F, Fut>(
    attempts: u32,
    delay: Duration,
    mut submit: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match submit().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= attempts || !is_sequence_conflict(&err) {
                    return Err(err);
                }
                tracing::warn!(
                    "Sequence conflict (attempt {}/{}), retrying: {:#}",
                    attempt,
                    attempts,
                    err
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// 시퀀스 넘버 경합 판별
///
/// 노드는 거부 사유를 에러 메시지에 담아 돌려줌. 경합 식별은
/// 메시지 패턴 매칭에 의존함 (에러 체인 전체를 본다)
fn is_sequence_conflict(err: &anyhow::Error) -> bool {
    let message = format!("{:#}", err);
    message.contains("SEQUENCE_NUMBER_TOO_OLD")
        || message.contains("SEQUENCE_NUMBER_TOO_NEW")
        || message.to_lowercase().contains("invalid sequence number")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_policy_retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<u32> = policy
            .run("test-op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(anyhow!("transient failure"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_policy_propagates_after_cap() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result: Result<()> = policy
            .run("test-op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow!("persistent failure")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_submit_retries_stale_sequence_exactly_three_times() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = submit_with_retry(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("Transaction submission failed (400): SEQUENCE_NUMBER_TOO_OLD")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_submit_does_not_retry_unrelated_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = submit_with_retry(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("INSUFFICIENT_BALANCE")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_detects_conflict_in_error_chain() {
        // 컨텍스트로 감싼 에러도 경합으로 식별해야 함
        let calls = AtomicU32::new(0);

        let result: Result<()> = submit_with_retry(2, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(anyhow!("node rejected: invalid sequence number")
                    .context("Transaction submission failed"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_submit_success_passthrough() {
        let calls = AtomicU32::new(0);

        let result = submit_with_retry(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("0xhash".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap(), "0xhash");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_recovers_after_conflict() {
        let calls = AtomicU32::new(0);

        let result = submit_with_retry(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(anyhow!("SEQUENCE_NUMBER_TOO_NEW"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
