use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::shop::Shop;
use super::supplier::Supplier;
use super::validate::{self, Validate, SKU_RE};
use super::{now_ts, parse_enum, parse_id, parse_opt_id, parse_ts, Category};
use crate::error::{AppError, AppResult};
use crate::types::{contains_pattern, Page, PageQuery};

string_enum! {
    Unit {
        Kg => "kg",
        Litre => "litre",
        Bag => "bag",
        Piece => "piece",
        Tonne => "tonne",
    }
}

pub const MAX_PRICE: f64 = 10_000_000.0;

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub unit: Unit,
    pub price: f64,
    pub stock_quantity: i64,
    pub sku: Option<String>,
    pub supplier_id: Uuid,
    pub shop_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub unit: Unit,
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: i64,
    pub sku: Option<String>,
    pub supplier_id: Uuid,
    pub shop_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub unit: Option<Unit>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub sku: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub supplier_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub in_stock: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

fn validate_fields(
    name: &str,
    description: Option<&str>,
    price: f64,
    stock_quantity: i64,
    sku: Option<&str>,
) -> AppResult<()> {
    validate::length("name", name, 2, 120)?;
    validate::max_length("description", description, 2000)?;
    validate::positive("price", price, MAX_PRICE)?;
    if stock_quantity < 0 {
        return Err(AppError::invalid_field("stock_quantity", "must not be negative"));
    }
    if let Some(sku) = sku.filter(|s| !s.trim().is_empty()) {
        validate::pattern("sku", sku.trim(), &SKU_RE, "3-32 of A-Z, 0-9 or '-'")?;
    }
    Ok(())
}

impl Validate for CreateProductRequest {
    fn validate(&self) -> AppResult<()> {
        validate_fields(&self.name, self.description.as_deref(), self.price, self.stock_quantity, self.sku.as_deref())
    }
}

impl Validate for Product {
    fn validate(&self) -> AppResult<()> {
        validate_fields(&self.name, self.description.as_deref(), self.price, self.stock_quantity, self.sku.as_deref())
    }
}

impl ProductFilter {
    fn validate(&self) -> AppResult<()> {
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(AppError::InvalidInput("min_price must not exceed max_price".into()));
            }
        }
        Ok(())
    }
}

async fn ensure_references(db: &SqlitePool, supplier_id: Uuid, shop_id: Option<Uuid>) -> AppResult<()> {
    if Supplier::find_by_id(db, supplier_id).await?.is_none() {
        return Err(AppError::invalid_field("supplier_id", "supplier does not exist"));
    }
    if let Some(shop_id) = shop_id {
        if Shop::find_by_id(db, shop_id).await?.is_none() {
            return Err(AppError::invalid_field("shop_id", "shop does not exist"));
        }
    }
    Ok(())
}

const COLUMNS: &str = "id, name, description, category, unit, price, stock_quantity, sku, supplier_id, shop_id, \
     is_active, created_at, updated_at";

impl Product {
    pub(crate) fn from_row(r: &SqliteRow) -> AppResult<Self> {
        Ok(Self {
            id: parse_id(&r.try_get::<String, _>("id")?)?,
            name: r.try_get("name")?,
            description: r.try_get("description")?,
            category: parse_enum(&r.try_get::<String, _>("category")?)?,
            unit: parse_enum(&r.try_get::<String, _>("unit")?)?,
            price: r.try_get("price")?,
            stock_quantity: r.try_get("stock_quantity")?,
            sku: r.try_get("sku")?,
            supplier_id: parse_id(&r.try_get::<String, _>("supplier_id")?)?,
            shop_id: parse_opt_id(r.try_get("shop_id")?)?,
            is_active: r.try_get("is_active")?,
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    pub async fn insert(db: &SqlitePool, req: &CreateProductRequest) -> AppResult<Self> {
        ensure_references(db, req.supplier_id, req.shop_id).await?;
        let id = Uuid::new_v4();
        let now = now_ts();
        sqlx::query(
            r#"INSERT INTO products (id, name, description, category, unit, price, stock_quantity, sku,
                   supplier_id, shop_id, is_active, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11, ?11)"#,
        )
        .bind(id.to_string())
        .bind(req.name.trim())
        .bind(validate::blank_to_none(req.description.clone()))
        .bind(req.category.as_str())
        .bind(req.unit.as_str())
        .bind(req.price)
        .bind(req.stock_quantity)
        .bind(validate::blank_to_none(req.sku.clone()))
        .bind(req.supplier_id.to_string())
        .bind(req.shop_id.map(|s| s.to_string()))
        .bind(&now)
        .execute(db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("a product with this sku already exists".into()),
            other => other,
        })?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("product vanished after insert")))
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM products WHERE id = ?1", COLUMNS))
            .bind(id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    pub async fn update(db: &SqlitePool, id: Uuid, req: UpdateProductRequest) -> AppResult<Self> {
        let mut p = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("product not found".into()))?;
        if let Some(v) = req.name {
            p.name = v.trim().to_string();
        }
        if req.description.is_some() {
            p.description = validate::blank_to_none(req.description);
        }
        if let Some(v) = req.category {
            p.category = v;
        }
        if let Some(v) = req.unit {
            p.unit = v;
        }
        if let Some(v) = req.price {
            p.price = v;
        }
        if let Some(v) = req.stock_quantity {
            p.stock_quantity = v;
        }
        if req.sku.is_some() {
            p.sku = validate::blank_to_none(req.sku);
        }
        if let Some(v) = req.supplier_id {
            p.supplier_id = v;
        }
        if let Some(v) = req.shop_id {
            p.shop_id = Some(v);
        }
        if let Some(v) = req.is_active {
            p.is_active = v;
        }
        p.validate()?;
        ensure_references(db, p.supplier_id, p.shop_id).await?;

        sqlx::query(
            r#"UPDATE products SET name=?1, description=?2, category=?3, unit=?4, price=?5, stock_quantity=?6,
                   sku=?7, supplier_id=?8, shop_id=?9, is_active=?10, updated_at=?11
               WHERE id=?12"#,
        )
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.category.as_str())
        .bind(p.unit.as_str())
        .bind(p.price)
        .bind(p.stock_quantity)
        .bind(&p.sku)
        .bind(p.supplier_id.to_string())
        .bind(p.shop_id.map(|s| s.to_string()))
        .bind(p.is_active)
        .bind(now_ts())
        .bind(id.to_string())
        .execute(db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("a product with this sku already exists".into()),
            other => other,
        })?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("product not found".into()))
    }

    pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = ?1").bind(id.to_string()).execute(db).await?;
        Ok(res.rows_affected() > 0)
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
        qb.push(" WHERE 1=1");
        if let Some(category) = filter.category {
            qb.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(supplier_id) = filter.supplier_id {
            qb.push(" AND supplier_id = ").push_bind(supplier_id.to_string());
        }
        if let Some(shop_id) = filter.shop_id {
            qb.push(" AND shop_id = ").push_bind(shop_id.to_string());
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND price <= ").push_bind(max);
        }
        match filter.in_stock {
            Some(true) => {
                qb.push(" AND stock_quantity > 0");
            }
            Some(false) => {
                qb.push(" AND stock_quantity = 0");
            }
            None => {}
        }
        if let Some(active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(active);
        }
        if let Some(pattern) = contains_pattern(filter.search.as_deref()) {
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '!' OR description LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '!' OR sku LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '!')");
        }
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &ProductFilter,
        sort: &PageQuery,
        page: Page,
    ) -> AppResult<(Vec<Self>, i64)> {
        filter.validate()?;
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM products");
        Self::push_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(db).await?.try_get("cnt")?;

        let column = sort.sort_column(&[("created_at", "created_at"), ("name", "name"), ("price", "price")]);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM products", COLUMNS));
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
