//! Extract the gym slug from the `X-Tenant-ID` header.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";

/// Gym slug from `X-Tenant-ID`, trimmed; `None` when absent or blank.
#[derive(Clone, Debug)]
pub struct TenantId(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for TenantId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let slug = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(TenantId(slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> TenantId {
        let (mut parts, _) = req.into_parts();
        TenantId::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn header_is_trimmed() {
        let req = Request::builder().header(TENANT_ID_HEADER, "  iron ").body(()).unwrap();
        assert_eq!(extract(req).await.0.as_deref(), Some("iron"));
    }

    #[tokio::test]
    async fn blank_header_counts_as_missing() {
        let req = Request::builder().header(TENANT_ID_HEADER, "  ").body(()).unwrap();
        assert!(extract(req).await.0.is_none());
        assert!(extract(Request::new(())).await.0.is_none());
    }
}
