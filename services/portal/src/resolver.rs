//! Role and display name resolution.
//!
//! Sources are consulted in a fixed order and the first success wins:
//! 1. the `profiles` record keyed by the session subject
//! 2. the `users` record keyed by the same id
//! 3. metadata embedded in the session identity
//!
//! Results are never merged across sources. The last tier cannot fail, so a
//! session always resolves to a user.

use tracing::{debug, warn};

use crate::directory::ProfileDirectory;
use crate::error::AuthError;
use crate::models::{RecordTable, Role, Session, User};

const LOOKUP_ORDER: [RecordTable; 2] = [RecordTable::Profiles, RecordTable::Users];

pub async fn resolve_user_from_session(
    session: &Session,
    directory: &dyn ProfileDirectory,
) -> User {
    let id = session.subject();
    let email = session.user.email.clone().unwrap_or_default();

    for table in LOOKUP_ORDER {
        match directory.fetch_record(table, session).await {
            Ok(record) => {
                debug!(
                    "Resolved {} from {} record as {}",
                    id,
                    table.table_name(),
                    record.role
                );
                return User {
                    id,
                    email,
                    role: record.role,
                    full_name: record.full_name.unwrap_or_default(),
                };
            }
            Err(AuthError::NotFound) => {
                debug!("No {} record for {}", table.table_name(), id);
            }
            Err(e) => {
                warn!("{} lookup failed for {}: {}", table.table_name(), id, e);
            }
        }
    }

    let metadata = &session.user.user_metadata;
    let role = Role::from_label(metadata.role.as_deref());
    debug!("Resolved {} from session metadata as {}", id, role);

    User {
        id,
        email,
        role,
        full_name: metadata.full_name.clone().unwrap_or_default(),
    }
}
