use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::user::{User, UserRole};
use super::validate::{self, Validate};
use super::{now_ts, parse_id, parse_ts};
use crate::error::{AppError, AppResult};
use crate::types::{contains_pattern, Page, PageQuery};

#[derive(Debug, Clone, Serialize)]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub manager_id: Uuid,
    pub village: Option<String>,
    pub district: String,
    pub region: String,
    pub phone: String,
    pub email: Option<String>,
    pub opening_hours: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
    pub manager_id: Uuid,
    pub village: Option<String>,
    pub district: String,
    pub region: String,
    pub phone: String,
    pub email: Option<String>,
    pub opening_hours: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateShopRequest {
    pub name: Option<String>,
    pub manager_id: Option<Uuid>,
    pub village: Option<String>,
    pub district: Option<String>,
    pub region: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub opening_hours: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShopFilter {
    pub region: Option<String>,
    pub district: Option<String>,
    pub manager_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

fn validate_fields(
    name: &str,
    district: &str,
    region: &str,
    phone: &str,
    email: Option<&str>,
    village: Option<&str>,
    opening_hours: Option<&str>,
) -> AppResult<()> {
    validate::length("name", name, 2, 100)?;
    validate::length("district", district, 2, 100)?;
    validate::length("region", region, 2, 100)?;
    validate::phone("phone", phone.trim())?;
    if let Some(e) = email.map(str::trim).filter(|e| !e.is_empty()) {
        validate::email("email", &validate::normalize_email(e))?;
    }
    validate::max_length("village", village, 100)?;
    validate::max_length("opening_hours", opening_hours, 100)?;
    Ok(())
}

impl Validate for CreateShopRequest {
    fn validate(&self) -> AppResult<()> {
        validate_fields(
            &self.name,
            &self.district,
            &self.region,
            &self.phone,
            self.email.as_deref(),
            self.village.as_deref(),
            self.opening_hours.as_deref(),
        )
    }
}

impl Validate for Shop {
    fn validate(&self) -> AppResult<()> {
        validate_fields(
            &self.name,
            &self.district,
            &self.region,
            &self.phone,
            self.email.as_deref(),
            self.village.as_deref(),
            self.opening_hours.as_deref(),
        )
    }
}

/// The manager of a shop must be an active shop-manager account.
pub async fn ensure_manager(db: &SqlitePool, manager_id: Uuid) -> AppResult<()> {
    match User::find_by_id(db, manager_id).await? {
        Some(u) if u.role == UserRole::ShopManager && u.is_active => Ok(()),
        Some(_) => Err(AppError::invalid_field("manager_id", "must reference an active shop manager")),
        None => Err(AppError::invalid_field("manager_id", "user does not exist")),
    }
}

const COLUMNS: &str =
    "id, name, manager_id, village, district, region, phone, email, opening_hours, is_active, created_at, updated_at";

impl Shop {
    fn from_row(r: &SqliteRow) -> AppResult<Self> {
        Ok(Self {
            id: parse_id(&r.try_get::<String, _>("id")?)?,
            name: r.try_get("name")?,
            manager_id: parse_id(&r.try_get::<String, _>("manager_id")?)?,
            village: r.try_get("village")?,
            district: r.try_get("district")?,
            region: r.try_get("region")?,
            phone: r.try_get("phone")?,
            email: r.try_get("email")?,
            opening_hours: r.try_get("opening_hours")?,
            is_active: r.try_get("is_active")?,
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    pub async fn insert(db: &SqlitePool, req: &CreateShopRequest) -> AppResult<Self> {
        ensure_manager(db, req.manager_id).await?;
        let id = Uuid::new_v4();
        let now = now_ts();
        sqlx::query(
            r#"INSERT INTO shops (id, name, manager_id, village, district, region, phone, email, opening_hours,
                   is_active, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)"#,
        )
        .bind(id.to_string())
        .bind(req.name.trim())
        .bind(req.manager_id.to_string())
        .bind(validate::blank_to_none(req.village.clone()))
        .bind(req.district.trim())
        .bind(req.region.trim())
        .bind(req.phone.trim())
        .bind(validate::blank_to_none(req.email.clone()).map(|e| validate::normalize_email(&e)))
        .bind(validate::blank_to_none(req.opening_hours.clone()))
        .bind(&now)
        .execute(db)
        .await?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("shop vanished after insert")))
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM shops WHERE id = ?1", COLUMNS))
            .bind(id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn update(db: &SqlitePool, id: Uuid, req: UpdateShopRequest) -> AppResult<Self> {
        let mut s = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("shop not found".into()))?;
        if let Some(v) = req.name {
            s.name = v.trim().to_string();
        }
        if let Some(manager_id) = req.manager_id {
            if manager_id != s.manager_id {
                ensure_manager(db, manager_id).await?;
                s.manager_id = manager_id;
            }
        }
        if req.village.is_some() {
            s.village = validate::blank_to_none(req.village);
        }
        if let Some(v) = req.district {
            s.district = v.trim().to_string();
        }
        if let Some(v) = req.region {
            s.region = v.trim().to_string();
        }
        if let Some(v) = req.phone {
            s.phone = v.trim().to_string();
        }
        if req.email.is_some() {
            s.email = validate::blank_to_none(req.email).map(|e| validate::normalize_email(&e));
        }
        if req.opening_hours.is_some() {
            s.opening_hours = validate::blank_to_none(req.opening_hours);
        }
        if let Some(v) = req.is_active {
            s.is_active = v;
        }
        s.validate()?;

        sqlx::query(
            r#"UPDATE shops SET name=?1, manager_id=?2, village=?3, district=?4, region=?5, phone=?6, email=?7,
                   opening_hours=?8, is_active=?9, updated_at=?10
               WHERE id=?11"#,
        )
        .bind(&s.name)
        .bind(s.manager_id.to_string())
        .bind(&s.village)
        .bind(&s.district)
        .bind(&s.region)
        .bind(&s.phone)
        .bind(&s.email)
        .bind(&s.opening_hours)
        .bind(s.is_active)
        .bind(now_ts())
        .bind(id.to_string())
        .execute(db)
        .await?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("shop not found".into()))
    }

    pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM shops WHERE id = ?1").bind(id.to_string()).execute(db).await?;
        Ok(res.rows_affected() > 0)
    }

    /// Ids of the shops a manager runs.
    pub async fn ids_managed_by(db: &SqlitePool, manager_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM shops WHERE manager_id = ?1")
            .bind(manager_id.to_string())
            .fetch_all(db)
            .await?;
        ids.iter().map(|s| parse_id(s)).collect()
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ShopFilter) {
        qb.push(" WHERE 1=1");
        if let Some(region) = filter.region.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND region = ").push_bind(region.to_string()).push(" COLLATE NOCASE");
        }
        if let Some(district) = filter.district.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND district = ").push_bind(district.to_string()).push(" COLLATE NOCASE");
        }
        if let Some(manager_id) = filter.manager_id {
            qb.push(" AND manager_id = ").push_bind(manager_id.to_string());
        }
        if let Some(active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(pattern) = contains_pattern(filter.search.as_deref()) {
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '!' OR village LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '!')");
        }
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &ShopFilter,
        sort: &PageQuery,
        page: Page,
    ) -> AppResult<(Vec<Self>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM shops");
        Self::push_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(db).await?.try_get("cnt")?;

        let column = sort.sort_column(&[("created_at", "created_at"), ("name", "name"), ("region", "region")]);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM shops", COLUMNS));
        Self::push_filters(&mut qb, filter);
        qb.push(format!(" ORDER BY {} {}, id ASC", column, sort.order.as_sql()))
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

    fn request() -> CreateShopRequest {
        CreateShopRequest {
            name: "Kitale Agrovet".into(),
            manager_id: Uuid::new_v4(),
            village: None,
            district: "Trans Nzoia".into(),
            region: "Rift Valley".into(),
            phone: "+254722333444".into(),
            email: Some("  ".into()),
            opening_hours: Some("Mon-Sat 08:00-18:00".into()),
        }
    }

    #[test]
    fn test_shop_validation() {
        assert!(request().validate().is_ok());
        let mut r = request();
        r.email = Some("not-an-email".into());
        assert!(r.validate().is_err());
        let mut r = request();
        r.district = "X".into();
        assert!(r.validate().is_err());
    }
}
