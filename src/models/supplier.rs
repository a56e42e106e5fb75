use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::validate::{self, Validate};
use super::{now_ts, parse_enum, parse_id, parse_json_list, parse_opt_id, parse_ts, rating_description, Category};
use crate::error::{AppError, AppResult};
use crate::types::{contains_pattern, Page, PageQuery};

string_enum! {
    SupplierStatus {
        Active => "active",
        Inactive => "inactive",
        Suspended => "suspended",
    }
}

string_enum! {
    PaymentTerms {
        Cash => "cash",
        Net15 => "net15",
        Net30 => "net30",
        Net60 => "net60",
    }
}

pub const DEFAULT_COUNTRY: &str = "Kenya";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: String,
    pub region: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    DEFAULT_COUNTRY.to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: String,
    pub phone: String,
    pub address: Address,
    pub categories: Vec<Category>,
    pub status: SupplierStatus,
    pub rating: f64,
    pub rating_count: i64,
    pub rating_description: &'static str,
    pub payment_terms: PaymentTerms,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSupplierRequest {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: String,
    pub phone: String,
    pub address: Address,
    pub categories: Vec<Category>,
    pub status: Option<SupplierStatus>,
    pub payment_terms: Option<PaymentTerms>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSupplierRequest {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Address>,
    pub categories: Option<Vec<Category>>,
    pub status: Option<SupplierStatus>,
    pub payment_terms: Option<PaymentTerms>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateSupplierRequest {
    pub rating: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupplierFilter {
    pub status: Option<SupplierStatus>,
    pub category: Option<Category>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub min_rating: Option<f64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplierStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub average_rating: f64,
    pub rated_suppliers: i64,
    pub by_category: BTreeMap<String, i64>,
}

fn dedup_categories(categories: &[Category]) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::with_capacity(categories.len());
    for c in categories {
        if !out.contains(c) {
            out.push(*c);
        }
    }
    out
}

fn validate_address(address: &Address) -> AppResult<()> {
    validate::max_length("address.street", address.street.as_deref(), 200)?;
    validate::length("address.city", &address.city, 2, 100)?;
    validate::length("address.region", &address.region, 2, 100)?;
    validate::length("address.country", &address.country, 2, 100)?;
    Ok(())
}

fn validate_categories(categories: &[Category]) -> AppResult<()> {
    let n = dedup_categories(categories).len();
    if n == 0 || n > Category::ALL.len() {
        return Err(AppError::invalid_field("categories", "must list at least one product category"));
    }
    Ok(())
}

impl Validate for CreateSupplierRequest {
    fn validate(&self) -> AppResult<()> {
        validate::length("name", &self.name, 2, 100)?;
        validate::max_length("contact_person", self.contact_person.as_deref(), 100)?;
        validate::email("email", &validate::normalize_email(&self.email))?;
        validate::phone("phone", self.phone.trim())?;
        validate_address(&self.address)?;
        validate_categories(&self.categories)?;
        validate::max_length("notes", self.notes.as_deref(), 1000)?;
        Ok(())
    }
}

impl Validate for Supplier {
    fn validate(&self) -> AppResult<()> {
        validate::length("name", &self.name, 2, 100)?;
        validate::max_length("contact_person", self.contact_person.as_deref(), 100)?;
        validate::email("email", &self.email)?;
        validate::phone("phone", &self.phone)?;
        validate_address(&self.address)?;
        validate_categories(&self.categories)?;
        validate::max_length("notes", self.notes.as_deref(), 1000)?;
        validate::range("rating", self.rating, 0.0, 5.0)?;
        Ok(())
    }
}

impl Validate for RateSupplierRequest {
    fn validate(&self) -> AppResult<()> {
        validate::range("rating", self.rating, 1, 5)
    }
}

const COLUMNS: &str = "id, name, contact_person, email, phone, street, city, region, country, categories, status, \
     rating, rating_count, payment_terms, notes, created_by, created_at, updated_at";

impl Supplier {
    fn from_row(r: &SqliteRow) -> AppResult<Self> {
        let rating: f64 = r.try_get("rating")?;
        Ok(Self {
            id: parse_id(&r.try_get::<String, _>("id")?)?,
            name: r.try_get("name")?,
            contact_person: r.try_get("contact_person")?,
            email: r.try_get("email")?,
            phone: r.try_get("phone")?,
            address: Address {
                street: r.try_get("street")?,
                city: r.try_get("city")?,
                region: r.try_get("region")?,
                country: r.try_get("country")?,
            },
            categories: parse_json_list(&r.try_get::<String, _>("categories")?)?,
            status: parse_enum(&r.try_get::<String, _>("status")?)?,
            rating: (rating * 100.0).round() / 100.0,
            rating_count: r.try_get("rating_count")?,
            rating_description: rating_description(rating),
            payment_terms: parse_enum(&r.try_get::<String, _>("payment_terms")?)?,
            notes: r.try_get("notes")?,
            created_by: parse_opt_id(r.try_get("created_by")?)?,
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    pub async fn insert(db: &SqlitePool, req: &CreateSupplierRequest, created_by: Uuid) -> AppResult<Self> {
        let id = Uuid::new_v4();
        let now = now_ts();
        let categories = serde_json::to_string(&dedup_categories(&req.categories))?;
        sqlx::query(
            r#"INSERT INTO suppliers (id, name, contact_person, email, phone, street, city, region, country,
                   categories, status, payment_terms, notes, created_by, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)"#,
        )
        .bind(id.to_string())
        .bind(req.name.trim())
        .bind(validate::blank_to_none(req.contact_person.clone()))
        .bind(validate::normalize_email(&req.email))
        .bind(req.phone.trim())
        .bind(validate::blank_to_none(req.address.street.clone()))
        .bind(req.address.city.trim())
        .bind(req.address.region.trim())
        .bind(req.address.country.trim())
        .bind(categories)
        .bind(req.status.unwrap_or(SupplierStatus::Active).as_str())
        .bind(req.payment_terms.unwrap_or(PaymentTerms::Net30).as_str())
        .bind(validate::blank_to_none(req.notes.clone()))
        .bind(created_by.to_string())
        .bind(&now)
        .execute(db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("a supplier with this email already exists".into()),
            other => other,
        })?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("supplier vanished after insert")))
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM suppliers WHERE id = ?1", COLUMNS))
            .bind(id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Applies a partial update, re-validates the merged document and persists it.
    pub async fn update(db: &SqlitePool, id: Uuid, req: UpdateSupplierRequest) -> AppResult<Self> {
        let mut s = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("supplier not found".into()))?;
        if let Some(v) = req.name {
            s.name = v.trim().to_string();
        }
        if req.contact_person.is_some() {
            s.contact_person = validate::blank_to_none(req.contact_person);
        }
        if let Some(v) = req.email {
            s.email = validate::normalize_email(&v);
        }
        if let Some(v) = req.phone {
            s.phone = v.trim().to_string();
        }
        if let Some(v) = req.address {
            s.address = Address { street: validate::blank_to_none(v.street), ..v };
        }
        if let Some(v) = req.categories {
            s.categories = dedup_categories(&v);
        }
        if let Some(v) = req.status {
            s.status = v;
        }
        if let Some(v) = req.payment_terms {
            s.payment_terms = v;
        }
        if req.notes.is_some() {
            s.notes = validate::blank_to_none(req.notes);
        }
        s.validate()?;

        sqlx::query(
            r#"UPDATE suppliers SET name=?1, contact_person=?2, email=?3, phone=?4, street=?5, city=?6, region=?7,
                   country=?8, categories=?9, status=?10, payment_terms=?11, notes=?12, updated_at=?13
               WHERE id=?14"#,
        )
        .bind(&s.name)
        .bind(&s.contact_person)
        .bind(&s.email)
        .bind(&s.phone)
        .bind(&s.address.street)
        .bind(s.address.city.trim())
        .bind(s.address.region.trim())
        .bind(s.address.country.trim())
        .bind(serde_json::to_string(&s.categories)?)
        .bind(s.status.as_str())
        .bind(s.payment_terms.as_str())
        .bind(&s.notes)
        .bind(now_ts())
        .bind(id.to_string())
        .execute(db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("a supplier with this email already exists".into()),
            other => other,
        })?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("supplier not found".into()))
    }

    /// Folds one new rating into the running average.
    pub async fn rate(db: &SqlitePool, id: Uuid, rating: u8) -> AppResult<Self> {
        let res = sqlx::query(
            r#"UPDATE suppliers
               SET rating = (rating * rating_count + ?1) / (rating_count + 1),
                   rating_count = rating_count + 1,
                   updated_at = ?2
               WHERE id = ?3"#,
        )
        .bind(f64::from(rating))
        .bind(now_ts())
        .bind(id.to_string())
        .execute(db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("supplier not found".into()));
        }
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("supplier not found".into()))
    }

    /// Deletes a supplier unless products still reference it.
    pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
        let linked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE supplier_id = ?1")
            .bind(id.to_string())
            .fetch_one(db)
            .await?;
        if linked > 0 {
            return Err(AppError::Conflict(format!("supplier still has {} product(s)", linked)));
        }
        let res = sqlx::query("DELETE FROM suppliers WHERE id = ?1").bind(id.to_string()).execute(db).await?;
        Ok(res.rows_affected() > 0)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &SupplierFilter) {
        qb.push(" WHERE 1=1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(category) = filter.category {
            qb.push(" AND EXISTS (SELECT 1 FROM json_each(suppliers.categories) WHERE json_each.value = ")
                .push_bind(category.as_str())
                .push(")");
        }
        if let Some(region) = filter.region.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND region = ").push_bind(region.to_string()).push(" COLLATE NOCASE");
        }
        if let Some(city) = filter.city.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND city = ").push_bind(city.to_string()).push(" COLLATE NOCASE");
        }
        if let Some(min) = filter.min_rating {
            qb.push(" AND rating >= ").push_bind(min);
        }
        if let Some(pattern) = contains_pattern(filter.search.as_deref()) {
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '!' OR contact_person LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '!' OR email LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '!')");
        }
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &SupplierFilter,
        sort: &PageQuery,
        page: Page,
    ) -> AppResult<(Vec<Self>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM suppliers");
        Self::push_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(db).await?.try_get("cnt")?;

        let column = sort.sort_column(&[("created_at", "created_at"), ("name", "name"), ("rating", "rating")]);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM suppliers", COLUMNS));
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

    /// Active suppliers, best rated first.
    pub async fn find_active(db: &SqlitePool, limit: i64) -> AppResult<Vec<Self>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM suppliers WHERE status = 'active' ORDER BY rating DESC, name ASC LIMIT ?1",
            COLUMNS
        ))
        .bind(limit)
        .fetch_all(db)
        .await?;
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn stats(db: &SqlitePool) -> AppResult<SupplierStats> {
        let mut by_status: BTreeMap<String, i64> =
            SupplierStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let rows = sqlx::query("SELECT status, COUNT(*) AS cnt FROM suppliers GROUP BY status").fetch_all(db).await?;
        for r in &rows {
            by_status.insert(r.try_get("status")?, r.try_get("cnt")?);
        }
        let total: i64 = by_status.values().sum();

        let row = sqlx::query(
            "SELECT COALESCE(AVG(rating), 0.0) AS avg_rating, COUNT(*) AS rated FROM suppliers WHERE rating_count > 0",
        )
        .fetch_one(db)
        .await?;
        let average_rating: f64 = row.try_get("avg_rating")?;

        let mut by_category: BTreeMap<String, i64> = BTreeMap::new();
        let rows = sqlx::query(
            r#"SELECT json_each.value AS category, COUNT(*) AS cnt
               FROM suppliers, json_each(suppliers.categories)
               GROUP BY json_each.value"#,
        )
        .fetch_all(db)
        .await?;
        for r in &rows {
            by_category.insert(r.try_get("category")?, r.try_get("cnt")?);
        }

        Ok(SupplierStats {
            total,
            by_status,
            average_rating: (average_rating * 100.0).round() / 100.0,
            rated_suppliers: row.try_get("rated")?,
            by_category,
        })
    }
}
