//! Resolved user model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// User as resolved from the current session.
///
/// Never stored: rebuilt on every refresh and credential event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub full_name: String,
}

impl User {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}
