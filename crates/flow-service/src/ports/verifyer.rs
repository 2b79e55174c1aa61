//! §6 Verifyer contract: `extract_permissions(token) -> null | {userid, permissions}`.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Permissions {
    pub max_dataset_num: u64,
}

#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub userid: String,
    pub permissions: Permissions,
}

pub trait Verifyer: Send + Sync {
    fn extract_permissions(&self, token: &str) -> Option<UserIdentity>;
}

/// Fixed token-to-identity table standing in for a real bearer-token
/// round trip to `AUTH_SERVER` (spec.md §6).
#[derive(Default)]
pub struct StaticVerifyer {
    tokens: HashMap<String, UserIdentity>,
}

impl StaticVerifyer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, userid: impl Into<String>, max_dataset_num: u64) -> Self {
        let userid = userid.into();
        self.tokens.insert(token.into(), UserIdentity { userid, permissions: Permissions { max_dataset_num } });
        self
    }
}

impl Verifyer for StaticVerifyer {
    fn extract_permissions(&self, token: &str) -> Option<UserIdentity> {
        self.tokens.get(token).cloned()
    }
}
