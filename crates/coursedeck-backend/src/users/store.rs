use chrono::{DateTime, Utc};
use coursedeck_shared::api::{UpdateRoleRequest, UploadPermissionRequest};
use coursedeck_shared::{User, UserRole};
use uuid::Uuid;

use crate::access::Actor;
use crate::courses::delete_courses_by_author;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::uploads::cleanup::delete_course_files;
use crate::uploads::UploadStorage;

const SELECT_USER: &str = r#"
    SELECT id, name, email, role, can_upload, is_verified, avatar, created_at, updated_at
    FROM users
"#;

type UserRow = (
    Uuid,
    String,
    String,
    UserRole,
    bool,
    Option<bool>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn user_from_row(row: UserRow) -> User {
    let (id, name, email, role, can_upload, is_verified, avatar, created_at, updated_at) = row;
    User {
        id,
        name,
        email,
        role,
        can_upload,
        // accounts from before email verification have no flag at all
        is_verified: is_verified.unwrap_or(false),
        avatar,
        created_at,
        updated_at,
    }
}

/// The stored avatar that `new` replaces, if it is a different file.
pub(crate) fn replaced_avatar<'a>(previous: Option<&'a str>, new: Option<&str>) -> Option<&'a str> {
    match (previous, new) {
        (Some(previous), Some(new)) if previous != new => Some(previous),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct UserStore {
    db: DbPool,
    storage: UploadStorage,
}

impl UserStore {
    pub fn new(db: DbPool, storage: UploadStorage) -> Self {
        Self { db, storage }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<User> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.map(user_from_row).ok_or(AppError::NotFound)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.db)
            .await?;

        Ok(row.map(user_from_row))
    }

    /// The acting user as stored, for callers that only have an id.
    pub async fn actor(&self, id: Uuid) -> AppResult<Actor> {
        Ok(Actor::from(&self.get(id).await?))
    }

    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<User>> {
        actor.require_admin()?;
        self.list_all().await
    }

    pub async fn list_all(&self) -> AppResult<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!("{SELECT_USER} ORDER BY created_at"))
            .fetch_all(&self.db)
            .await?;

        Ok(rows.into_iter().map(user_from_row).collect())
    }

    /// Users edit themselves; admins edit anyone. Blank values are ignored.
    /// A replaced avatar file is deleted.
    pub async fn update_profile(
        &self,
        actor: &Actor,
        id: Uuid,
        name: Option<&str>,
        avatar: Option<&str>,
    ) -> AppResult<User> {
        if actor.id != id && !actor.is_admin() {
            return Err(AppError::Forbidden);
        }

        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let avatar = avatar.map(str::trim).filter(|a| !a.is_empty());

        let mut tx = self.db.begin().await?;

        let previous: Option<(Option<String>,)> =
            sqlx::query_as("SELECT avatar FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (previous,) = previous.ok_or(AppError::NotFound)?;

        sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), avatar = COALESCE($3, avatar), updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(avatar)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if let Some(old) = replaced_avatar(previous.as_deref(), avatar) {
            self.storage.delete_url(old);
        }
        self.get(id).await
    }

    /// Change a user's role. Promoting to admin also grants upload
    /// permission; demoting leaves the grant as it was.
    pub async fn set_role(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UpdateRoleRequest,
    ) -> AppResult<User> {
        actor.require_admin()?;
        let role = req.role;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = $2, can_upload = can_upload OR $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(role)
        .bind(role.is_admin())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        tracing::info!(user_id = %id, role = role.as_str(), by = %actor.id, "Role changed");
        self.get(id).await
    }

    pub async fn set_upload_permission(
        &self,
        actor: &Actor,
        id: Uuid,
        req: UploadPermissionRequest,
    ) -> AppResult<User> {
        actor.require_admin()?;

        let result = sqlx::query("UPDATE users SET can_upload = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(req.can_upload)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        self.get(id).await
    }

    /// Store a new avatar URL, returning the previous one.
    pub async fn set_avatar(&self, id: Uuid, url: &str) -> AppResult<Option<String>> {
        let mut tx = self.db.begin().await?;

        let previous: Option<(Option<String>,)> =
            sqlx::query_as("SELECT avatar FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (previous,) = previous.ok_or(AppError::NotFound)?;

        sqlx::query("UPDATE users SET avatar = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(url)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    /// Delete a user together with their avatar, their courses and every
    /// file those courses reference.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        actor.require_admin()?;
        if actor.id == id {
            return Err(AppError::Conflict("Admins cannot delete their own account".to_string()));
        }

        let user = self.get(id).await?;

        let mut tx = self.db.begin().await?;
        let owned = delete_courses_by_author(&mut *tx, id).await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if let Some(avatar) = &user.avatar {
            self.storage.delete_url(avatar);
        }
        for course in &owned {
            delete_course_files(&self.storage, course);
        }

        tracing::info!(user_id = %id, courses = owned.len(), by = %actor.id, "User deleted");
        Ok(())
    }

    /// Promote the account with `email` to admin with upload permission.
    /// Returns whether an account was changed.
    pub async fn make_admin_by_email(&self, email: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role = 'admin', can_upload = TRUE, updated_at = $2
            WHERE email = $1
            "#,
        )
        .bind(email.trim().to_lowercase())
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every account that is not verified yet as verified. Used once
    /// when email verification was introduced.
    pub async fn verify_legacy_users(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE users SET is_verified = TRUE, updated_at = $1 WHERE is_verified IS NOT TRUE",
        )
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaced_avatar_only_when_changed() {
        let old = "/uploads/avatar-1-2.png";

        assert_eq!(replaced_avatar(Some(old), Some("/uploads/avatar-3-4.png")), Some(old));
        assert_eq!(replaced_avatar(Some(old), Some(old)), None);
        assert_eq!(replaced_avatar(Some(old), None), None);
        assert_eq!(replaced_avatar(None, Some(old)), None);
    }
}
