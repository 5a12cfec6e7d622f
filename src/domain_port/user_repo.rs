use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("user not found")]
    NotFound,
    #[error("email or external id already registered")]
    Conflict,
    #[error("store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub role: Role,
    pub permissions: PermissionSet,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub permissions: Option<PermissionSet>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none() && self.role.is_none() && self.permissions.is_none()
    }
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<UserRecord, RepoError>;

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Fails with `RepoError::Conflict` when the email or the Google id is
    /// already taken.
    async fn create(&self, user: NewUser) -> Result<UserRecord, RepoError>;

    async fn update_fields(&self, user_id: UserId, update: UserUpdate) -> Result<(), RepoError>;
}
