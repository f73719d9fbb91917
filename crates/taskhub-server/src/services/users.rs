//! User service: relational CRUD wrapped in the cache-aside layer

use std::sync::Arc;

use taskhub_core::{EntityKind, NewUser, Result, TaskhubError, User, UserPatch};
use tracing::info;

use std::collections::HashSet;

use crate::services::auth;
use crate::services::cache::{EntityCache, WriteTouch};
use crate::services::WriteOutcome;
use crate::storage::{Database, NewUserRecord};

pub struct UserService {
    db: Arc<Database>,
    cache: Arc<EntityCache>,
}

impl UserService {
    pub fn new(db: Arc<Database>, cache: Arc<EntityCache>) -> Self {
        Self { db, cache }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User> {
        let db = Arc::clone(&self.db);
        self.cache
            .read_entity(EntityKind::User, id, move || async move {
                db.get_user_by_id(id).await
            })
            .await?
            .ok_or(TaskhubError::not_found(EntityKind::User, id))
    }

    pub async fn list_all(&self) -> Result<Vec<User>> {
        let db = Arc::clone(&self.db);
        self.cache
            .read_list(EntityKind::User, move || async move {
                db.list_users().await
            })
            .await
    }

    /// Bulk lookup. Bypasses the entity cache: the result set is ad hoc,
    /// and ids with no matching user are simply absent from it.
    pub async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        self.db.list_users_by_ids(ids).await
    }

    /// Creates the whole batch or none of it. Uniqueness is checked within
    /// the batch and against existing rows before any insert runs.
    pub async fn create_many(&self, batch: Vec<NewUser>) -> Result<WriteOutcome<Vec<User>>> {
        let mut usernames = HashSet::new();
        let mut emails = HashSet::new();
        for data in &batch {
            validate_new_user(data)?;
            if !usernames.insert(data.username.clone())
                || self.db.user_id_by_username(&data.username).await?.is_some()
            {
                return Err(TaskhubError::UsernameExists);
            }
            if !emails.insert(data.email.clone())
                || self.db.user_id_by_email(&data.email).await?.is_some()
            {
                return Err(TaskhubError::EmailExists);
            }
        }

        let mut records = Vec::with_capacity(batch.len());
        for data in batch {
            records.push(NewUserRecord {
                password_hash: auth::hash_password(&data.password)?,
                username: data.username,
                email: data.email,
            });
        }

        let users = self.db.create_users(&records).await?;
        info!("created {} users in bulk", users.len());

        let mut cache_degraded = false;
        for user in &users {
            cache_degraded |= self.cache.invalidate(&WriteTouch::user(user.id)).await;
        }
        Ok(WriteOutcome {
            entity: users,
            cache_degraded,
        })
    }

    pub async fn create(&self, data: NewUser) -> Result<WriteOutcome<User>> {
        validate_new_user(&data)?;

        if self.db.user_id_by_username(&data.username).await?.is_some() {
            return Err(TaskhubError::UsernameExists);
        }
        if self.db.user_id_by_email(&data.email).await?.is_some() {
            return Err(TaskhubError::EmailExists);
        }

        let password_hash = auth::hash_password(&data.password)?;
        let user = self
            .db
            .create_user(&data.username, &data.email, &password_hash)
            .await?;
        info!("created user {} ({})", user.username, user.id);

        // Invalidate after commit, before the response is shaped
        let cache_degraded = self.cache.invalidate(&WriteTouch::user(user.id)).await;
        Ok(WriteOutcome {
            entity: user,
            cache_degraded,
        })
    }

    pub async fn update(&self, id: i64, patch: UserPatch) -> Result<WriteOutcome<User>> {
        if let Some(username) = &patch.username {
            if username.len() < 3 {
                return Err(TaskhubError::Validation(
                    "username must be at least 3 characters".to_string(),
                ));
            }
            match self.db.user_id_by_username(username).await? {
                Some(other) if other != id => return Err(TaskhubError::UsernameExists),
                _ => {}
            }
        }
        if let Some(email) = &patch.email {
            if !email.contains('@') {
                return Err(TaskhubError::Validation("invalid email".to_string()));
            }
            match self.db.user_id_by_email(email).await? {
                Some(other) if other != id => return Err(TaskhubError::EmailExists),
                _ => {}
            }
        }

        let user = self
            .db
            .update_user(id, &patch)
            .await?
            .ok_or(TaskhubError::not_found(EntityKind::User, id))?;

        let cache_degraded = self.cache.invalidate(&WriteTouch::user(id)).await;
        Ok(WriteOutcome {
            entity: user,
            cache_degraded,
        })
    }

    pub async fn delete(&self, id: i64) -> Result<WriteOutcome<User>> {
        let user = self
            .db
            .delete_user(id)
            .await?
            .ok_or(TaskhubError::not_found(EntityKind::User, id))?;
        info!("deleted user {} ({})", user.username, user.id);

        let cache_degraded = self.cache.invalidate(&WriteTouch::user(id)).await;
        Ok(WriteOutcome {
            entity: user,
            cache_degraded,
        })
    }
}

fn validate_new_user(data: &NewUser) -> Result<()> {
    if data.username.len() < 3 || data.username.len() > 50 {
        return Err(TaskhubError::Validation(
            "username must be 3..=50 characters".to_string(),
        ));
    }
    if !data.email.contains('@') {
        return Err(TaskhubError::Validation("invalid email".to_string()));
    }
    if data.password.len() < 6 {
        return Err(TaskhubError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}
