//! Per-request caller credentials
//!
//! Credentials are built fresh for every request from the user store and the
//! social graph. They are never cached: a role change or a new friendship
//! applies to the very next request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::oid::ObjectId;
use tracing::debug;

use crate::auth::Role;
use crate::db::bounded;
use crate::db::schemas::default_language;
use crate::social::{SocialGraph, UserRef};
use crate::users::UserStore;
use crate::types::{GarageError, Result};

/// Who is calling, with what role, and who their friends are
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Absent for anonymous callers
    pub user_id: Option<ObjectId>,
    /// Login name at resolution time, absent for anonymous callers
    pub login_name: Option<String>,
    pub role: Role,
    pub language: String,
    pub friends: Vec<UserRef>,
}

impl Credentials {
    /// Guest credentials for a caller without a session
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            login_name: None,
            role: Role::Guest,
            language: default_language(),
            friends: Vec::new(),
        }
    }

    pub fn is_friend(&self, user_id: &ObjectId) -> bool {
        self.friends.iter().any(|f| &f.reference_id == user_id)
    }

    pub fn friend_ids(&self) -> Vec<ObjectId> {
        self.friends.iter().map(|f| f.reference_id).collect()
    }
}

/// Looks up display names for relation and audit records.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// `NoData` when the user does not exist
    async fn display_name(&self, user_id: ObjectId) -> Result<String>;
}

/// Turns a caller id into credentials.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, caller_id: &str) -> Result<Credentials>;
}

/// Resolves credentials from the user store and the social graph
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    graph: Arc<SocialGraph>,
    timeout: Duration,
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserStore>, graph: Arc<SocialGraph>, timeout: Duration) -> Self {
        Self {
            users,
            graph,
            timeout,
        }
    }
}

#[async_trait]
impl CredentialResolver for CredentialService {
    async fn resolve(&self, caller_id: &str) -> Result<Credentials> {
        if caller_id.is_empty() {
            return Ok(Credentials::anonymous());
        }

        let user_id = ObjectId::parse_str(caller_id)?;

        let identity = bounded(self.timeout, "users.identity", self.users.identity(user_id))
            .await?
            .ok_or_else(|| GarageError::NoData(format!("user {}", caller_id)))?;

        let friends = match self.graph.friends(user_id).await {
            Ok(friends) => friends,
            Err(GarageError::NoData(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        debug!(
            user_id = %user_id,
            role = %identity.role,
            friends = friends.len(),
            "Credentials resolved"
        );

        Ok(Credentials {
            user_id: Some(user_id),
            login_name: Some(identity.login_name),
            role: identity.role,
            language: identity.language,
            friends,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemorySocialStore, MemoryUserStore};
    use crate::auth::JwtValidator;
    use crate::db::schemas::UserDoc;
    use crate::users::UserService;

    async fn setup() -> (Arc<MemoryUserStore>, Arc<SocialGraph>, CredentialService) {
        let users = Arc::new(MemoryUserStore::new());
        let names = Arc::new(UserService::new(
            users.clone(),
            JwtValidator::new_dev(),
            Duration::from_secs(1),
        ));
        let graph = Arc::new(SocialGraph::new(
            Arc::new(MemorySocialStore::new()),
            names,
            Duration::from_secs(1),
        ));
        let service = CredentialService::new(users.clone(), graph.clone(), Duration::from_secs(1));
        (users, graph, service)
    }

    async fn add_user(users: &MemoryUserStore, name: &str, role: Role) -> ObjectId {
        let doc = UserDoc::new(
            name.to_string(),
            format!("{}@example.com", name),
            "hash".to_string(),
            role,
        );
        users.insert(doc).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_id_is_anonymous() {
        let (_, _, service) = setup().await;
        let credentials = service.resolve("").await.unwrap();
        assert!(credentials.user_id.is_none());
        assert!(credentials.login_name.is_none());
        assert_eq!(credentials.role, Role::Guest);
        assert!(credentials.friends.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_ids() {
        let (_, _, service) = setup().await;

        let err = service.resolve("not-an-id").await.unwrap_err();
        assert!(matches!(err, GarageError::InvalidId(_)));

        let err = service.resolve(&ObjectId::new().to_hex()).await.unwrap_err();
        assert!(matches!(err, GarageError::NoData(_)));
    }

    #[tokio::test]
    async fn test_resolves_role_and_friends() {
        let (users, graph, service) = setup().await;
        let admin = add_user(&users, "admin", Role::Admin).await;
        let friend = add_user(&users, "friend", Role::Member).await;

        let credentials = service.resolve(&admin.to_hex()).await.unwrap();
        assert_eq!(credentials.user_id, Some(admin));
        assert_eq!(credentials.role, Role::Admin);
        assert_eq!(credentials.login_name.as_deref(), Some("admin"));
        assert!(credentials.friends.is_empty());

        graph.add_friend(friend, admin).await.unwrap();

        let credentials = service.resolve(&admin.to_hex()).await.unwrap();
        assert!(credentials.is_friend(&friend));
        assert_eq!(credentials.friend_ids(), vec![friend]);
    }
}
