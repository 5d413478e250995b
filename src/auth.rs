use std::collections::HashMap;

use async_trait::async_trait;

/// Who is asking for a mapping. Issued by the session provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
}

impl CallerIdentity {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

/// Validates session tokens. The real provider lives outside this crate.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Option<CallerIdentity>;
}

/// Fixed token table loaded from config.
pub struct StaticSessions {
    tokens: HashMap<String, String>,
}

impl StaticSessions {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn authenticate(&self, token: &str) -> Option<CallerIdentity> {
        self.tokens
            .get(token)
            .map(|user| CallerIdentity::new(user))
    }
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}
