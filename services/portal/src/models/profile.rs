//! Profile and user record models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// Table a role/name record is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTable {
    /// Primary source of truth
    Profiles,
    /// Secondary source, consulted when the profile lookup fails
    Users,
}

impl RecordTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            RecordTable::Profiles => "profiles",
            RecordTable::Users => "users",
        }
    }
}

/// Role and display name as stored in either record table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Profile row written on sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}
