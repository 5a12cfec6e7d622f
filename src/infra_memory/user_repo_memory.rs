use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicI64, Ordering};

/// Process-local user store for tests and the `memory` backend.
pub struct MemoryUserRepo {
    users: DashMap<UserId, UserRecord>,
    emails: DashMap<String, UserId>,
    google_ids: DashMap<String, UserId>,
    next_id: AtomicI64,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        MemoryUserRepo {
            users: DashMap::new(),
            emails: DashMap::new(),
            google_ids: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryUserRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let Some(user_id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<UserRecord, RepoError> {
        self.users
            .get(&user_id)
            .map(|u| u.clone())
            .ok_or(RepoError::NotFound)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<UserRecord>, RepoError> {
        let Some(user_id) = self.google_ids.get(google_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|u| u.clone()))
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        // The email slot stays locked while the Google id is claimed.
        let Entry::Vacant(email_slot) = self.emails.entry(user.email.clone()) else {
            return Err(RepoError::Conflict);
        };
        let id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Some(google_id) = &user.google_id {
            match self.google_ids.entry(google_id.clone()) {
                Entry::Occupied(_) => return Err(RepoError::Conflict),
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }

        let record = UserRecord {
            id,
            email: user.email,
            password_hash: user.password_hash,
            google_id: user.google_id,
            role: user.role,
            permissions: user.permissions,
        };
        self.users.insert(id, record.clone());
        email_slot.insert(id);
        Ok(record)
    }

    async fn update_fields(&self, user_id: UserId, update: UserUpdate) -> Result<(), RepoError> {
        let mut user = self.users.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        if let Some(password_hash) = update.password_hash {
            user.password_hash = Some(password_hash);
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(permissions) = update.permissions {
            user.permissions = permissions;
        }
        Ok(())
    }
}
