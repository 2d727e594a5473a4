use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email is already in use")]
    DuplicateEmail,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn insert(&self, user: NewUser) -> StoreResult<User>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// All users, oldest first.
    async fn list(&self) -> StoreResult<Vec<User>>;
    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;
    /// Returns the ids that matched; unknown ids are skipped.
    async fn set_active(&self, ids: &[Uuid], active: bool) -> StoreResult<Vec<Uuid>>;
    /// Deletes all matching rows or none of them.
    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>>;
}

const USER_COLUMNS: &str =
    "id, email, password_hash, full_name, created_at, last_login_at, is_active";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, created_at, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.created_at)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateEmail)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.db)
            .await
            .context("record last login")?;
        Ok(())
    }

    async fn set_active(&self, ids: &[Uuid], active: bool) -> StoreResult<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE users
               SET is_active = $1
             WHERE id = ANY($2)
         RETURNING id
            "#,
        )
        .bind(active)
        .bind(ids.to_vec())
        .fetch_all(&self.db)
        .await
        .context("update is_active")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            let res = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(*id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("delete user {id}"))?;
            if res.rows_affected() > 0 {
                deleted.push(*id);
            }
        }
        tx.commit().await.context("commit tx")?;
        Ok(deleted)
    }
}

/// These need a live Postgres: `DATABASE_URL=... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "$argon2id$placeholder".into(),
            full_name: "Test User".into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn email_lookup_and_uniqueness_ignore_case(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let ann = store.insert(new_user("Ann@Example.com")).await.unwrap();
        assert!(ann.is_active);
        assert!(ann.last_login_at.is_none());

        let found = store.find_by_email("ann@EXAMPLE.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(ann.id));

        let dup = store.insert(new_user("ANN@example.com")).await;
        assert!(matches!(dup, Err(StoreError::DuplicateEmail)));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn set_active_returns_only_matched_ids(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let a = store.insert(new_user("a@x.com")).await.unwrap();
        let b = store.insert(new_user("b@x.com")).await.unwrap();
        let unknown = Uuid::new_v4();

        let mut changed = store.set_active(&[a.id, unknown, b.id], false).await.unwrap();
        changed.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(changed, expected);

        for user in store.list().await.unwrap() {
            assert!(!user.is_active, "{} should be blocked", user.email);
        }
        assert!(store.set_active(&[], true).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn delete_many_removes_listed_rows_only(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let a = store.insert(new_user("a@x.com")).await.unwrap();
        let b = store.insert(new_user("b@x.com")).await.unwrap();
        let keep = store.insert(new_user("keep@x.com")).await.unwrap();

        let deleted = store
            .delete_many(&[a.id, Uuid::new_v4(), b.id])
            .await
            .unwrap();
        assert_eq!(deleted, vec![a.id, b.id]);

        let left: Vec<Uuid> = store.list().await.unwrap().into_iter().map(|u| u.id).collect();
        assert_eq!(left, vec![keep.id]);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn record_login_sets_timestamp(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let user = store.insert(new_user("login@x.com")).await.unwrap();
        let at = OffsetDateTime::now_utc();
        store.record_login(user.id, at).await.unwrap();

        let reloaded = store.find_by_id(user.id).await.unwrap().unwrap();
        let stamped = reloaded.last_login_at.expect("last login recorded");
        assert!((stamped - at).abs() < time::Duration::seconds(1));
    }
}
