use std::collections::HashSet;

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{StoreError, StoreResult, UserStore},
    repo_types::{NewUser, User},
};

/// Matches Postgres `lower(a) = lower(b)`.
fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// `UserStore` kept in a vector, insertion ordered.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
    poisoned: RwLock<HashSet<Uuid>>,
}

impl MemoryUserStore {
    /// Makes any later delete batch containing `id` fail.
    pub async fn fail_deletes_of(&self, id: Uuid) {
        self.poisoned.write().await.insert(id);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| same_email(&u.email, &user.email)) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            created_at: user.created_at,
            last_login_at: None,
            is_active: true,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| same_email(&u.email, email))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        if let Some(u) = self.users.write().await.iter_mut().find(|u| u.id == id) {
            u.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn set_active(&self, ids: &[Uuid], active: bool) -> StoreResult<Vec<Uuid>> {
        let mut users = self.users.write().await;
        let mut matched = Vec::new();
        for u in users.iter_mut().filter(|u| ids.contains(&u.id)) {
            u.is_active = active;
            matched.push(u.id);
        }
        Ok(matched)
    }

    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let poisoned = self.poisoned.read().await;
        if let Some(id) = ids.iter().find(|id| poisoned.contains(id)) {
            return Err(anyhow!("delete user {id}: simulated store failure").into());
        }
        let mut users = self.users.write().await;
        let mut deleted = Vec::new();
        users.retain(|u| {
            let hit = ids.contains(&u.id);
            if hit {
                deleted.push(u.id);
            }
            !hit
        });
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "hash".into(),
            full_name: "Name".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn email_matching_folds_non_ascii_case() {
        let store = MemoryUserStore::default();
        store.insert(new_user("élise@x.com")).await.unwrap();

        assert!(store.find_by_email("ÉLISE@X.COM").await.unwrap().is_some());
        let err = store.insert(new_user("Élise@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }
}
