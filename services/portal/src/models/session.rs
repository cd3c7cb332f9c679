//! Provider session model

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Metadata the identity provider carries on the identity itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl UserMetadata {
    /// Metadata attached to every new account
    pub fn for_new_member(full_name: &str) -> Self {
        Self {
            full_name: Some(full_name.to_string()),
            role: Some(Role::Member.as_str().to_string()),
        }
    }
}

/// Identity as issued by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Provider-issued proof of authentication.
///
/// The portal consumes sessions; it never mints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as unix seconds
    pub expires_at: i64,
    pub user: IdentityUser,
}

impl Session {
    /// Subject the session was issued for
    pub fn subject(&self) -> Uuid {
        self.user.id
    }

    /// Whether the session expires within `margin_secs` from now
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        self.expires_at - margin_secs <= Utc::now().timestamp()
    }

    /// Seconds until expiry, zero once expired
    pub fn remaining_secs(&self) -> u64 {
        (self.expires_at - Utc::now().timestamp()).max(0) as u64
    }
}
