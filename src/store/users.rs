//! User accounts and their issued auth tokens.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{Store, new_id, store_err};
use crate::error::AppError;

const USER_COLUMNS: &str = "id, username, email, password_hash, name, age, profile_picture, \
     share_progress_with_teachers, allow_activity_tracking, receive_emails, is_admin, \
     created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub share_progress_with_teachers: bool,
    pub allow_activity_tracking: bool,
    pub receive_emails: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            share_progress_with_teachers: false,
            allow_activity_tracking: true,
            receive_emails: true,
        }
    }
}

/// Partial privacy change; `None` leaves the current value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyUpdate {
    pub share_progress_with_teachers: Option<bool>,
    pub allow_activity_tracking: Option<bool>,
    pub receive_emails: Option<bool>,
}

impl PrivacySettings {
    pub fn merged(mut self, update: &PrivacyUpdate) -> Self {
        if let Some(v) = update.share_progress_with_teachers {
            self.share_progress_with_teachers = v;
        }
        if let Some(v) = update.allow_activity_tracking {
            self.allow_activity_tracking = v;
        }
        if let Some(v) = update.receive_emails {
            self.receive_emails = v;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub age: Option<u32>,
    pub profile_picture: Option<String>,
    pub privacy: PrivacySettings,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub age: u32,
    pub is_admin: bool,
}

/// Profile fields to overwrite; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub age: Option<u32>,
    pub profile_picture: Option<String>,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        name: row.get(4)?,
        age: row.get(5)?,
        profile_picture: row.get(6)?,
        privacy: PrivacySettings {
            share_progress_with_teachers: row.get(7)?,
            allow_activity_tracking: row.get(8)?,
            receive_emails: row.get(9)?,
        },
        is_admin: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl Store {
    pub fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let id = new_id();
        let privacy = PrivacySettings::default();
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, name, age, profile_picture, \
             share_progress_with_teachers, allow_activity_tracking, receive_emails, is_admin, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                id,
                new.username,
                new.email,
                new.password_hash,
                new.name,
                new.age,
                privacy.share_progress_with_teachers,
                privacy.allow_activity_tracking,
                privacy.receive_emails,
                new.is_admin,
                now,
            ],
        )
        .map_err(store_err("insert user"))?;

        Ok(User {
            id,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            age: Some(new.age),
            profile_picture: None,
            privacy,
            is_admin: new.is_admin,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(store_err("find user by id"))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(store_err("find user by email"))
    }

    /// Apply `update` and return the stored result, or `None` if the user is gone.
    pub fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Option<User>, AppError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE users SET \
                   name = COALESCE(?2, name), \
                   username = COALESCE(?3, username), \
                   email = COALESCE(?4, email), \
                   age = COALESCE(?5, age), \
                   profile_picture = COALESCE(?6, profile_picture), \
                   updated_at = ?7 \
                 WHERE id = ?1",
                params![
                    id,
                    update.name,
                    update.username,
                    update.email,
                    update.age,
                    update.profile_picture,
                    Utc::now(),
                ],
            )
            .map_err(store_err("update profile"))?;
        if changed == 0 {
            return Ok(None);
        }
        drop(conn);
        self.find_user_by_id(id)
    }

    pub fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<(), AppError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, password_hash, Utc::now()],
        )
        .map_err(store_err("update password"))?;
        Ok(())
    }

    pub fn set_privacy(&self, id: &str, privacy: &PrivacySettings) -> Result<(), AppError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET share_progress_with_teachers = ?2, allow_activity_tracking = ?3, \
             receive_emails = ?4, updated_at = ?5 WHERE id = ?1",
            params![
                id,
                privacy.share_progress_with_teachers,
                privacy.allow_activity_tracking,
                privacy.receive_emails,
                Utc::now(),
            ],
        )
        .map_err(store_err("update privacy"))?;
        Ok(())
    }

    // ── tokens ───────────────────────────────────────────────────────────────

    /// Record a token for `user_id`, dropping that user's tokens older than
    /// `ttl` since they can no longer verify.
    pub fn add_token(&self, user_id: &str, token_hash: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn()?;
        let now = Utc::now();
        let tx = conn.transaction().map_err(store_err("begin add token"))?;
        tx.execute(
            "DELETE FROM auth_tokens WHERE user_id = ?1 AND created_at < ?2",
            params![user_id, now - ttl],
        )
        .map_err(store_err("prune expired tokens"))?;
        tx.execute(
            "INSERT OR IGNORE INTO auth_tokens (user_id, token_hash, created_at) VALUES (?1, ?2, ?3)",
            params![user_id, token_hash, now],
        )
        .map_err(store_err("insert token"))?;
        tx.commit().map_err(store_err("commit add token"))
    }

    pub fn has_token(&self, user_id: &str, token_hash: &str) -> Result<bool, AppError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT 1 FROM auth_tokens WHERE user_id = ?1 AND token_hash = ?2",
            params![user_id, token_hash],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(store_err("lookup token"))
    }

    /// Returns `true` when the token was present.
    pub fn remove_token(&self, user_id: &str, token_hash: &str) -> Result<bool, AppError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM auth_tokens WHERE user_id = ?1 AND token_hash = ?2",
            params![user_id, token_hash],
        )
        .map(|n| n > 0)
        .map_err(store_err("delete token"))
    }

    /// Revoke every token of `user_id`; returns how many were removed.
    pub fn clear_tokens(&self, user_id: &str) -> Result<usize, AppError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM auth_tokens WHERE user_id = ?1", params![user_id])
            .map_err(store_err("clear tokens"))
    }
}
