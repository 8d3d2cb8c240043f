//! Account registration, login and public profiles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{hash_password, verify_password, JwtValidator, Role, MIN_PASSWORD_LEN};
use crate::credentials::NameResolver;
use crate::db::bounded;
use crate::db::schemas::{default_language, Privacy, UserDoc};
use crate::social::{SocialGraph, UserRef};
use crate::types::{GarageError, Result};
use crate::users::UserStore;

/// Longest accepted login name
pub const MAX_LOGIN_NAME_LEN: usize = 32;

/// Longest accepted Xbox gamertag
pub const MAX_XBOX_TAG_LEN: usize = 15;

/// Registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub login_name: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    fn validate(self) -> Result<Self> {
        let login_name = self.login_name.trim().to_string();
        let email = self.email.trim().to_lowercase();

        if login_name.is_empty() || login_name.len() > MAX_LOGIN_NAME_LEN {
            return Err(GarageError::Validation(format!(
                "login name must be 1-{} characters",
                MAX_LOGIN_NAME_LEN
            )));
        }
        if login_name.chars().any(char::is_whitespace) {
            return Err(GarageError::Validation(
                "login name must not contain whitespace".into(),
            ));
        }
        if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err(GarageError::Validation("invalid e-mail address".into()));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(GarageError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        Ok(Self {
            login_name,
            email,
            password: self.password,
        })
    }
}

/// Login payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub login_name: String,
    pub password: String,
}

/// Profile fields a user may edit on their own account
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSettings {
    #[serde(default)]
    pub xbox_tag: String,
    #[serde(default)]
    pub privacy: Privacy,
    #[serde(default = "default_language")]
    pub language: String,
}

impl ProfileSettings {
    fn validate(self) -> Result<Self> {
        let xbox_tag = self.xbox_tag.trim().to_string();
        let language = self.language.trim().to_lowercase();

        if xbox_tag.chars().count() > MAX_XBOX_TAG_LEN {
            return Err(GarageError::Validation(format!(
                "xbox tag must be at most {} characters",
                MAX_XBOX_TAG_LEN
            )));
        }
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
            return Err(GarageError::Validation("invalid language code".into()));
        }

        Ok(Self {
            xbox_tag,
            privacy: self.privacy,
            language,
        })
    }
}

/// Password change payload
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub login_name: String,
    pub role: Role,
}

/// Public view of a user
///
/// For anyone but the owner, `privacy` blanks either the login name or
/// the Xbox tag.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub login_name: String,
    pub role: Role,
    pub language: String,
    pub xbox_tag: String,
    pub privacy: Privacy,
    pub last_seen: Vec<DateTime<Utc>>,
    pub friends: Vec<UserRef>,
    pub following: Vec<UserRef>,
    pub followers: Vec<UserRef>,
}

/// User account service
pub struct UserService {
    store: Arc<dyn UserStore>,
    jwt: JwtValidator,
    timeout: Duration,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, jwt: JwtValidator, timeout: Duration) -> Self {
        Self {
            store,
            jwt,
            timeout,
        }
    }

    pub fn jwt(&self) -> &JwtValidator {
        &self.jwt
    }

    /// Register a new member account.
    pub async fn create_user(&self, new_user: NewUser) -> Result<ObjectId> {
        let new_user = new_user.validate()?;
        let password_hash = hash_password(&new_user.password)?;

        let doc = UserDoc::new(
            new_user.login_name.clone(),
            new_user.email,
            password_hash,
            Role::Member,
        );
        let id = bounded(self.timeout, "users.insert", self.store.insert(doc)).await?;

        info!(user_id = %id, login_name = %new_user.login_name, "User created");
        Ok(id)
    }

    /// Check a password and issue a session token.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let login_name = request.login_name.trim();

        let user = bounded(
            self.timeout,
            "users.find_by_login",
            self.store.find_by_login(login_name),
        )
        .await?
        .ok_or(GarageError::InvalidLogin)?;

        if !verify_password(&request.password, &user.password_hash)? {
            debug!(login_name = %login_name, "Password mismatch");
            return Err(GarageError::InvalidLogin);
        }

        let id = user
            ._id
            .ok_or_else(|| GarageError::Internal("stored user has no id".into()))?;
        let token = self.jwt.generate_token(&id.to_hex(), &user.login_name)?;

        // last-seen is informational; a failed write does not fail the login
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.push_last_seen(id, bson::DateTime::now()).await {
                warn!(user_id = %id, error = %e, "Failed to record last seen");
            }
        });

        info!(user_id = %id, "User logged in");

        Ok(LoginResponse {
            token,
            user_id: id.to_hex(),
            login_name: user.login_name,
            role: user.role,
        })
    }

    /// Profile of `id` as seen by `viewer` (None for anonymous callers),
    /// including the user's relations.
    pub async fn profile(
        &self,
        id: ObjectId,
        viewer: Option<ObjectId>,
        graph: &SocialGraph,
    ) -> Result<UserProfile> {
        let mut user = bounded(self.timeout, "users.find_by_id", self.store.find_by_id(id))
            .await?
            .ok_or_else(|| GarageError::NoData(format!("user {}", id)))?;

        if viewer != Some(id) {
            match user.privacy {
                Privacy::ShowAll => {}
                Privacy::UserName => user.xbox_tag.clear(),
                Privacy::XboxTag => user.login_name.clear(),
            }
        }

        let friends = graph.friends(id).await?;
        let following = graph.following(id).await?;
        let followers = graph.followers(id).await?;

        Ok(UserProfile {
            id: id.to_hex(),
            login_name: user.login_name,
            role: user.role,
            language: user.language,
            xbox_tag: user.xbox_tag,
            privacy: user.privacy,
            last_seen: user.last_seen.iter().map(|t| t.to_chrono()).collect(),
            friends,
            following,
            followers,
        })
    }

    /// Update the caller's own profile settings.
    pub async fn update_settings(&self, id: ObjectId, settings: ProfileSettings) -> Result<()> {
        let settings = settings.validate()?;

        let found = bounded(
            self.timeout,
            "users.update_settings",
            self.store.update_settings(id, &settings),
        )
        .await?;
        if !found {
            return Err(GarageError::NoData(format!("user {}", id)));
        }

        debug!(user_id = %id, privacy = ?settings.privacy, "Profile settings updated");
        Ok(())
    }

    /// Replace the password after checking the current one.
    pub async fn set_password(&self, id: ObjectId, change: PasswordChange) -> Result<()> {
        let user = bounded(self.timeout, "users.find_by_id", self.store.find_by_id(id))
            .await?
            .ok_or_else(|| GarageError::NoData(format!("user {}", id)))?;

        if !verify_password(&change.current_password, &user.password_hash)? {
            return Err(GarageError::InvalidLogin);
        }
        if change.new_password.len() < MIN_PASSWORD_LEN {
            return Err(GarageError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = hash_password(&change.new_password)?;
        let found = bounded(
            self.timeout,
            "users.set_password",
            self.store.set_password(id, &password_hash),
        )
        .await?;
        if !found {
            return Err(GarageError::Internal(format!("user {} vanished during password change", id)));
        }

        info!(user_id = %id, "Password changed");
        Ok(())
    }
}

#[async_trait]
impl NameResolver for UserService {
    async fn display_name(&self, user_id: ObjectId) -> Result<String> {
        bounded(self.timeout, "users.identity", self.store.identity(user_id))
            .await?
            .map(|identity| identity.login_name)
            .ok_or_else(|| GarageError::NoData(format!("user {}", user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemorySocialStore, MemoryUserStore};
    use crate::types::DuplicateField;

    fn service() -> (Arc<MemoryUserStore>, UserService) {
        let store = Arc::new(MemoryUserStore::new());
        let service = UserService::new(store.clone(), JwtValidator::new_dev(), Duration::from_secs(1));
        (store, service)
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            login_name: name.to_string(),
            email: format!("{}@example.com", name),
            password: "correct horse".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_user_defaults_to_member() {
        let (store, service) = service();
        let id = service.create_user(new_user("roger")).await.unwrap();

        let stored = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Member);
        assert_ne!(stored.password_hash, "correct horse");
        assert_eq!(service.display_name(id).await.unwrap(), "roger");
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates_and_bad_input() {
        let (_, service) = service();
        service.create_user(new_user("roger")).await.unwrap();

        let err = service.create_user(new_user("roger")).await.unwrap_err();
        assert!(matches!(err, GarageError::DuplicateKey(DuplicateField::LoginName)));

        let mut other = new_user("dodger");
        other.email = "ROGER@example.com".into();
        let err = service.create_user(other).await.unwrap_err();
        assert!(matches!(err, GarageError::DuplicateKey(DuplicateField::EMail)));

        let mut short = new_user("shorty");
        short.password = "abc".into();
        assert!(matches!(
            service.create_user(short).await.unwrap_err(),
            GarageError::Validation(_)
        ));

        let mut spaced = new_user("x");
        spaced.login_name = "two words".into();
        assert!(matches!(
            service.create_user(spaced).await.unwrap_err(),
            GarageError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let (_, service) = service();
        let id = service.create_user(new_user("roger")).await.unwrap();

        let response = service
            .login(LoginRequest {
                login_name: "roger".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap();
        assert_eq!(response.user_id, id.to_hex());

        let claims = service.jwt().verify_token(&response.token).unwrap();
        assert_eq!(claims.sub, id.to_hex());

        let err = service
            .login(LoginRequest {
                login_name: "roger".into(),
                password: "wrong password".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GarageError::InvalidLogin));

        let err = service
            .login(LoginRequest {
                login_name: "nobody".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GarageError::InvalidLogin));
    }

    #[tokio::test]
    async fn test_profile_includes_relations() {
        let (store, service) = service();
        let service = Arc::new(service);
        let graph = SocialGraph::new(
            Arc::new(MemorySocialStore::new()),
            service.clone(),
            Duration::from_secs(1),
        );

        let a = service.create_user(new_user("alice")).await.unwrap();
        let b = service.create_user(new_user("bob")).await.unwrap();
        graph.add_friend(a, b).await.unwrap();
        graph.follow(b, a).await.unwrap();

        let profile = service.profile(a, Some(b), &graph).await.unwrap();
        assert_eq!(profile.login_name, "alice");
        assert_eq!(profile.friends.len(), 1);
        assert_eq!(profile.followers.len(), 1);
        assert!(profile.following.is_empty());

        store
            .push_last_seen(a, bson::DateTime::now())
            .await
            .unwrap();
        let profile = service.profile(a, None, &graph).await.unwrap();
        assert_eq!(profile.last_seen.len(), 1);

        assert!(matches!(
            service.profile(ObjectId::new(), None, &graph).await.unwrap_err(),
            GarageError::NoData(_)
        ));
    }

    fn settings(xbox_tag: &str, privacy: Privacy) -> ProfileSettings {
        ProfileSettings {
            xbox_tag: xbox_tag.to_string(),
            privacy,
            language: "en".to_string(),
        }
    }

    #[tokio::test]
    async fn test_privacy_applies_to_visitors_only() {
        let (_, service) = service();
        let service = Arc::new(service);
        let graph = SocialGraph::new(
            Arc::new(MemorySocialStore::new()),
            service.clone(),
            Duration::from_secs(1),
        );
        let owner = service.create_user(new_user("alice")).await.unwrap();
        let visitor = service.create_user(new_user("bob")).await.unwrap();

        service
            .update_settings(owner, settings(" AliceGT ", Privacy::ShowAll))
            .await
            .unwrap();
        let seen = service.profile(owner, Some(visitor), &graph).await.unwrap();
        assert_eq!((seen.login_name.as_str(), seen.xbox_tag.as_str()), ("alice", "AliceGT"));

        service
            .update_settings(owner, settings("AliceGT", Privacy::UserName))
            .await
            .unwrap();
        let seen = service.profile(owner, Some(visitor), &graph).await.unwrap();
        assert_eq!((seen.login_name.as_str(), seen.xbox_tag.as_str()), ("alice", ""));

        service
            .update_settings(owner, settings("AliceGT", Privacy::XboxTag))
            .await
            .unwrap();
        let seen = service.profile(owner, None, &graph).await.unwrap();
        assert_eq!((seen.login_name.as_str(), seen.xbox_tag.as_str()), ("", "AliceGT"));

        let own = service.profile(owner, Some(owner), &graph).await.unwrap();
        assert_eq!((own.login_name.as_str(), own.xbox_tag.as_str()), ("alice", "AliceGT"));
        assert_eq!(own.privacy, Privacy::XboxTag);
    }

    #[tokio::test]
    async fn test_update_settings_validates_and_requires_user() {
        let (_, service) = service();
        let id = service.create_user(new_user("alice")).await.unwrap();

        let long_tag = settings("a gamertag far too long", Privacy::ShowAll);
        assert!(matches!(
            service.update_settings(id, long_tag).await.unwrap_err(),
            GarageError::Validation(_)
        ));

        let mut bad_language = settings("", Privacy::ShowAll);
        bad_language.language = "e n".into();
        assert!(matches!(
            service.update_settings(id, bad_language).await.unwrap_err(),
            GarageError::Validation(_)
        ));

        assert!(matches!(
            service
                .update_settings(ObjectId::new(), settings("", Privacy::ShowAll))
                .await
                .unwrap_err(),
            GarageError::NoData(_)
        ));
    }

    #[tokio::test]
    async fn test_set_password_replaces_login_secret() {
        let (_, service) = service();
        let id = service.create_user(new_user("roger")).await.unwrap();
        let login = |password: &str| LoginRequest {
            login_name: "roger".into(),
            password: password.into(),
        };

        let wrong_current = PasswordChange {
            current_password: "not my password".into(),
            new_password: "battery staple".into(),
        };
        assert!(matches!(
            service.set_password(id, wrong_current).await.unwrap_err(),
            GarageError::InvalidLogin
        ));

        let too_short = PasswordChange {
            current_password: "correct horse".into(),
            new_password: "abc".into(),
        };
        assert!(matches!(
            service.set_password(id, too_short).await.unwrap_err(),
            GarageError::Validation(_)
        ));

        service
            .set_password(
                id,
                PasswordChange {
                    current_password: "correct horse".into(),
                    new_password: "battery staple".into(),
                },
            )
            .await
            .unwrap();

        assert!(service.login(login("battery staple")).await.is_ok());
        assert!(matches!(
            service.login(login("correct horse")).await.unwrap_err(),
            GarageError::InvalidLogin
        ));
    }
}
