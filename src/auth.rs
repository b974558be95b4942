//! 세션 토큰 인증
//!
//! # Interview Q&A
//!
//! Q: 인증은 어디서 일어나는가?
//! A: axum extractor로 핸들러 시그니처에 선언적으로
//!    - 핸들러가 `AuthUser`를 인자로 받으면 추출 시점에 검증됨
//!    - `Authorization: Bearer <token>` → sessions 테이블 조회 → 사용자 로드
//!    - 실패하면 핸들러 본문에 진입하지 않고 401 반환
//!
//! Q: 세션 조회 실패를 왜 재시도하는가?
//! A: DB 커넥션 풀 고갈 같은 일시 장애 때문
//!    - 재시도 대상은 저장소 **에러**뿐. 토큰 불일치(Ok(None))는 즉시 401
//!    - 만료/위조 토큰을 재시도해 봐야 결과는 같음

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::db::UserAccount;
use crate::error::ApiError;
use crate::services::RetryPolicy;
use crate::AppState;

/// 인증된 사용자. 핸들러 인자로 선언하면 자동 추출됨
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub display_name: String,
    pub email_verified: bool,
    pub wallet_address: Option<String>,
}

impl From<UserAccount> for AuthUser {
    fn from(user: UserAccount) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            email_verified: user.email_verified,
            wallet_address: user.wallet_address,
        }
    }
}

/// Authorization 헤더에서 bearer 토큰 추출
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or(ApiError::Unauthorized)?
            .to_string();

        let store = state.store.clone();
        let user = RetryPolicy::default()
            .run("session lookup", || {
                let store = store.clone();
                let token = token.clone();
                async move { store.session_user(&token).await }
            })
            .await
            .map_err(ApiError::from)?;

        user.map(AuthUser::from).ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/rewards");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = parts_with(Some("Bearer tok-123"));
        assert_eq!(bearer_token(&parts), Some("tok-123"));
    }

    #[test]
    fn test_missing_header_yields_none() {
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn test_non_bearer_scheme_yields_none() {
        assert_eq!(bearer_token(&parts_with(Some("Basic abc123"))), None);
    }

    #[test]
    fn test_blank_token_yields_none() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer   "))), None);
    }
}
