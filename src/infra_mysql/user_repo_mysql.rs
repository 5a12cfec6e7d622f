use super::util::is_dup_key;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    fn encode_permissions(permissions: &PermissionSet) -> Result<String, RepoError> {
        serde_json::to_string(permissions).map_err(|e| RepoError::Store(e.to_string()))
    }

    fn row_to_record(row: MySqlRow) -> Result<UserRecord, RepoError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| RepoError::Store(e.to_string()))?;
        let email: String = row
            .try_get("email")
            .map_err(|e| RepoError::Store(e.to_string()))?;
        let password_hash: Option<String> = row
            .try_get("password_hash")
            .map_err(|e| RepoError::Store(e.to_string()))?;
        let google_id: Option<String> = row
            .try_get("google_id")
            .map_err(|e| RepoError::Store(e.to_string()))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| RepoError::Store(e.to_string()))?;
        let permissions: String = row
            .try_get("permissions")
            .map_err(|e| RepoError::Store(e.to_string()))?;

        Ok(UserRecord {
            id: UserId(id),
            email,
            password_hash,
            google_id,
            role: role.parse::<Role>().map_err(RepoError::Store)?,
            permissions: serde_json::from_str(&permissions)
                .map_err(|e| RepoError::Store(format!("permissions column: {e}")))?,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, google_id, role, permissions FROM user WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Store(format!("query user by email: {e}")))?;

        row.map(Self::row_to_record).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<UserRecord, RepoError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, google_id, role, permissions FROM user WHERE id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Store(format!("query user by id: {e}")))?
        .ok_or(RepoError::NotFound)?;

        Self::row_to_record(row)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, google_id, role, permissions FROM user WHERE google_id = ?",
        )
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Store(format!("query user by google id: {e}")))?;

        row.map(Self::row_to_record).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let permissions = Self::encode_permissions(&user.permissions)?;

        let result = sqlx::query(
            r#"
INSERT INTO user (email, password_hash, google_id, role, permissions)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.google_id)
        .bind(user.role.as_str())
        .bind(permissions)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                RepoError::Conflict
            } else {
                RepoError::Store(e.to_string())
            }
        })?;

        Ok(UserRecord {
            id: UserId(result.last_insert_id() as i64),
            email: user.email,
            password_hash: user.password_hash,
            google_id: user.google_id,
            role: user.role,
            permissions: user.permissions,
        })
    }

    async fn update_fields(&self, user_id: UserId, update: UserUpdate) -> Result<(), RepoError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<MySql> = QueryBuilder::new("UPDATE user SET ");
        let mut columns = builder.separated(", ");
        if let Some(password_hash) = update.password_hash {
            columns.push("password_hash = ").push_bind_unseparated(password_hash);
        }
        if let Some(role) = update.role {
            columns.push("role = ").push_bind_unseparated(role.as_str());
        }
        if let Some(permissions) = update.permissions {
            let permissions = Self::encode_permissions(&permissions)?;
            columns.push("permissions = ").push_bind_unseparated(permissions);
        }
        builder.push(" WHERE id = ").push_bind(user_id.0);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Store(e.to_string()))?;

        if result.rows_affected() == 0 {
            // MySQL reports 0 for unchanged rows too, so confirm the row exists.
            self.find_by_id(user_id).await?;
        }
        Ok(())
    }
}
