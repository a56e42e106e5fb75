use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::validate::{self, Validate};
use super::{now_ts, parse_enum, parse_id, parse_opt_ts, parse_ts};
use crate::error::{AppError, AppResult};
use crate::types::{contains_pattern, Page, PageQuery};

string_enum! {
    /// Access level carried in the token and checked by handlers.
    UserRole {
        Farmer => "farmer",
        Agent => "agent",
        ShopManager => "shop_manager",
        Admin => "admin",
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Farmer
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMeRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Admin-only changes to another account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

pub fn validate_password(password: &str) -> AppResult<()> {
    let n = password.chars().count();
    if !(8..=128).contains(&n) {
        return Err(AppError::invalid_field("password", "must be between 8 and 128 characters"));
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(AppError::invalid_field("password", "must contain at least one letter and one digit"));
    }
    Ok(())
}

impl Validate for RegisterRequest {
    fn validate(&self) -> AppResult<()> {
        validate::length("name", &self.name, 2, 100)?;
        validate::email("email", &validate::normalize_email(&self.email))?;
        validate_password(&self.password)?;
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            validate::phone("phone", phone.trim())?;
        }
        Ok(())
    }
}

impl Validate for UpdateMeRequest {
    fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validate::length("name", name, 2, 100)?;
        }
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            validate::phone("phone", phone.trim())?;
        }
        Ok(())
    }
}

const COLUMNS: &str =
    "id, name, email, phone, role, password_hash, is_active, last_login_at, created_at, updated_at";

impl User {
    fn from_row(r: &SqliteRow) -> AppResult<Self> {
        Ok(Self {
            id: parse_id(&r.try_get::<String, _>("id")?)?,
            name: r.try_get("name")?,
            email: r.try_get("email")?,
            phone: r.try_get("phone")?,
            role: parse_enum(&r.try_get::<String, _>("role")?)?,
            password_hash: r.try_get("password_hash")?,
            is_active: r.try_get("is_active")?,
            last_login_at: parse_opt_ts(r.try_get("last_login_at")?)?,
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    /// Inserts a new account. The request must already be validated and the password hashed.
    pub async fn insert(db: &SqlitePool, req: &RegisterRequest, password_hash: &str) -> AppResult<Self> {
        let id = Uuid::new_v4();
        let now = now_ts();
        let email = validate::normalize_email(&req.email);
        let phone = validate::blank_to_none(req.phone.clone());
        sqlx::query(
            r#"INSERT INTO users (id, name, email, phone, role, password_hash, is_active, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)"#,
        )
        .bind(id.to_string())
        .bind(req.name.trim())
        .bind(&email)
        .bind(phone)
        .bind(req.role.as_str())
        .bind(password_hash)
        .bind(&now)
        .execute(db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("email {} is already registered", email)),
            other => other,
        })?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("user vanished after insert")))
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?1", COLUMNS))
            .bind(id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn find_by_email(db: &SqlitePool, email: &str) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?1", COLUMNS))
            .bind(validate::normalize_email(email))
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn touch_last_login(db: &SqlitePool, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(now_ts())
            .bind(id.to_string())
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn update_me(db: &SqlitePool, id: Uuid, req: &UpdateMeRequest) -> AppResult<Self> {
        let mut user = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("user not found".into()))?;
        if let Some(name) = &req.name {
            user.name = name.trim().to_string();
        }
        if req.phone.is_some() {
            user.phone = validate::blank_to_none(req.phone.clone());
        }
        sqlx::query("UPDATE users SET name = ?1, phone = ?2, updated_at = ?3 WHERE id = ?4")
            .bind(&user.name)
            .bind(&user.phone)
            .bind(now_ts())
            .bind(id.to_string())
            .execute(db)
            .await?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("user not found".into()))
    }

    pub async fn set_password_hash(db: &SqlitePool, id: Uuid, hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(hash)
            .bind(now_ts())
            .bind(id.to_string())
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn admin_update(db: &SqlitePool, id: Uuid, req: &AdminUpdateUserRequest) -> AppResult<Self> {
        let mut user = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("user not found".into()))?;
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(active) = req.is_active {
            user.is_active = active;
        }
        sqlx::query("UPDATE users SET role = ?1, is_active = ?2, updated_at = ?3 WHERE id = ?4")
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(now_ts())
            .bind(id.to_string())
            .execute(db)
            .await?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("user not found".into()))
    }

    pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?1").bind(id.to_string()).execute(db).await?;
        Ok(res.rows_affected() > 0)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &UserFilter) {
        qb.push(" WHERE 1=1");
        if let Some(role) = filter.role {
            qb.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(pattern) = contains_pattern(filter.search.as_deref()) {
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '!' OR email LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '!')");
        }
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &UserFilter,
        sort: &PageQuery,
        page: Page,
    ) -> AppResult<(Vec<Self>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM users");
        Self::push_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(db).await?.try_get("cnt")?;

        let column = sort.sort_column(&[("created_at", "created_at"), ("name", "name"), ("email", "email")]);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users", COLUMNS));
        Self::push_filters(&mut qb, filter);
        qb.push(format!(" ORDER BY {} {}", column, sort.order.as_sql()))
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(db).await?;
        let items = rows.iter().map(Self::from_row).collect::<AppResult<Vec<_>>>()?;
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Grace Wanjiku".into(),
            email: email.into(),
            password: password.into(),
            role: UserRole::Farmer,
            phone: Some("+254700111222".into()),
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register("grace@farm.co.ke", "maize2024").validate().is_ok());
        assert!(register("grace@", "maize2024").validate().is_err());
        assert!(register("grace@farm.co.ke", "short1").validate().is_err());
        assert!(register("grace@farm.co.ke", "onlyletters").validate().is_err());
        assert!(register("grace@farm.co.ke", "1234567890").validate().is_err());
    }

    #[test]
    fn test_role_defaults_to_farmer() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"name":"Ann","email":"a@b.co","password":"pass1234"}"#).unwrap();
        assert_eq!(req.role, UserRole::Farmer);
        let req: RegisterRequest = serde_json::from_str(
            r#"{"name":"Ann","email":"a@b.co","password":"pass1234","role":"shop_manager"}"#,
        )
        .unwrap();
        assert_eq!(req.role, UserRole::ShopManager);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ann".into(),
            email: "a@b.co".into(),
            phone: None,
            role: UserRole::Agent,
            password_hash: "$argon2id$secret".into(),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "agent");
    }
}
