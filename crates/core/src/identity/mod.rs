//! Signed-in user identity and its resolution for sync calls.

mod session;

pub use session::{AuthEvent, AuthEvents, AuthSession, IdentityResolver, SessionProvider};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity issued by the auth provider and mirrored under `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl UserIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: None,
            email: None,
            photo_url: None,
            last_login: None,
        }
    }
}
