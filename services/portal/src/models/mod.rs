//! Portal models

pub mod profile;
pub mod role;
pub mod session;
pub mod user;

// Re-export for convenience
pub use profile::{NewProfile, ProfileRecord, RecordTable};
pub use role::Role;
pub use session::{IdentityUser, Session, UserMetadata};
pub use user::User;
