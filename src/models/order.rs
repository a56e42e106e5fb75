use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::shop::Shop;
use super::validate::{self, Validate};
use super::{now_ts, parse_enum, parse_id, parse_json_list, parse_opt_id, parse_ts};
use crate::error::{AppError, AppResult};
use crate::types::{Page, PageQuery};

string_enum! {
    OrderStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Processing => "processing",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

string_enum! {
    PaymentStatus {
        Unpaid => "unpaid",
        Paid => "paid",
        Refunded => "refunded",
    }
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

pub const MAX_ITEMS: usize = 50;
pub const MAX_QUANTITY: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub subtotal: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub buyer_id: Uuid,
    pub shop_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub shop_id: Option<Uuid>,
    pub items: Vec<OrderLine>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub shop_id: Option<Uuid>,
    pub buyer_id: Option<Uuid>,
}

/// Which orders a caller may see.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderScope {
    All,
    Buyer(Uuid),
    Shops(Vec<Uuid>),
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub delivered_revenue: f64,
}

impl Validate for CreateOrderRequest {
    fn validate(&self) -> AppResult<()> {
        if self.items.is_empty() || self.items.len() > MAX_ITEMS {
            return Err(AppError::invalid_field("items", format!("must contain between 1 and {} lines", MAX_ITEMS)));
        }
        for (i, line) in self.items.iter().enumerate() {
            validate::range(&format!("items[{}].quantity", i), line.quantity, 1, MAX_QUANTITY)?;
        }
        let mut seen: Vec<Uuid> = Vec::with_capacity(self.items.len());
        for line in &self.items {
            if seen.contains(&line.product_id) {
                return Err(AppError::invalid_field("items", "each product may appear only once"));
            }
            seen.push(line.product_id);
        }
        validate::max_length("delivery_address", self.delivery_address.as_deref(), 300)?;
        validate::max_length("notes", self.notes.as_deref(), 1000)?;
        Ok(())
    }
}

fn order_number(id: Uuid, at: DateTime<Utc>) -> String {
    let simple = id.simple().to_string().to_uppercase();
    format!("ORD-{}-{}", at.format("%Y%m%d"), &simple[..8])
}

fn round_money(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

const COLUMNS: &str = "id, order_number, buyer_id, shop_id, items, total_amount, status, payment_status, \
     delivery_address, notes, created_at, updated_at";

impl Order {
    fn from_row(r: &SqliteRow) -> AppResult<Self> {
        Ok(Self {
            id: parse_id(&r.try_get::<String, _>("id")?)?,
            order_number: r.try_get("order_number")?,
            buyer_id: parse_id(&r.try_get::<String, _>("buyer_id")?)?,
            shop_id: parse_opt_id(r.try_get("shop_id")?)?,
            items: parse_json_list(&r.try_get::<String, _>("items")?)?,
            total_amount: r.try_get("total_amount")?,
            status: parse_enum(&r.try_get::<String, _>("status")?)?,
            payment_status: parse_enum(&r.try_get::<String, _>("payment_status")?)?,
            delivery_address: r.try_get("delivery_address")?,
            notes: r.try_get("notes")?,
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    /// Prices the lines from the catalogue, reserves stock and stores the order in one transaction.
    pub async fn place(db: &SqlitePool, buyer_id: Uuid, req: &CreateOrderRequest) -> AppResult<Self> {
        if let Some(shop_id) = req.shop_id {
            match Shop::find_by_id(db, shop_id).await? {
                Some(shop) if shop.is_active => {}
                Some(_) => return Err(AppError::invalid_field("shop_id", "shop is not active")),
                None => return Err(AppError::invalid_field("shop_id", "shop does not exist")),
            }
        }

        let mut tx = db.begin().await?;
        let mut items: Vec<OrderItem> = Vec::with_capacity(req.items.len());
        let mut product_shops: Vec<Option<String>> = Vec::with_capacity(req.items.len());

        for line in &req.items {
            let row = sqlx::query("SELECT name, price, stock_quantity, is_active, shop_id FROM products WHERE id = ?1")
                .bind(line.product_id.to_string())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::invalid_field("items", format!("product {} does not exist", line.product_id)))?;
            let name: String = row.try_get("name")?;
            let price: f64 = row.try_get("price")?;
            let stock: i64 = row.try_get("stock_quantity")?;
            let active: bool = row.try_get("is_active")?;
            let shop: Option<String> = row.try_get("shop_id")?;

            if !active {
                return Err(AppError::BadRequest(format!("product '{}' is not available", name)));
            }
            if let Some(shop_id) = req.shop_id {
                if shop.as_deref() != Some(shop_id.to_string().as_str()) {
                    return Err(AppError::BadRequest(format!("product '{}' is not sold by this shop", name)));
                }
            }
            if stock < line.quantity {
                return Err(AppError::BadRequest(format!(
                    "insufficient stock for '{}': requested {}, available {}",
                    name, line.quantity, stock
                )));
            }

            let res = sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - ?1, updated_at = ?2 WHERE id = ?3 AND stock_quantity >= ?1",
            )
            .bind(line.quantity)
            .bind(now_ts())
            .bind(line.product_id.to_string())
            .execute(&mut *tx)
            .await?;
            if res.rows_affected() == 0 {
                return Err(AppError::Conflict(format!("stock for '{}' changed, please retry", name)));
            }

            items.push(OrderItem {
                product_id: line.product_id,
                name,
                quantity: line.quantity,
                unit_price: price,
                subtotal: round_money(price * line.quantity as f64),
            });
            product_shops.push(shop);
        }

        // Without an explicit shop, attribute the order to the shop all lines share (if any)
        let shop_id = match req.shop_id {
            Some(s) => Some(s.to_string()),
            None => match product_shops.first() {
                Some(first) if first.is_some() && product_shops.iter().all(|s| s == first) => first.clone(),
                _ => None,
            },
        };

        let total = round_money(items.iter().map(|i| i.subtotal).sum());
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO orders (id, order_number, buyer_id, shop_id, items, total_amount, status, payment_status,
                   delivery_address, notes, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 'unpaid', ?7, ?8, ?9, ?9)"#,
        )
        .bind(id.to_string())
        .bind(order_number(id, now))
        .bind(buyer_id.to_string())
        .bind(shop_id)
        .bind(serde_json::to_string(&items)?)
        .bind(total)
        .bind(validate::blank_to_none(req.delivery_address.clone()))
        .bind(validate::blank_to_none(req.notes.clone()))
        .bind(super::ts(now))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("order vanished after insert")))
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = ?1", COLUMNS))
            .bind(id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Moves the order along its lifecycle. Cancelling puts the reserved stock back.
    pub async fn transition(db: &SqlitePool, id: Uuid, next: OrderStatus) -> AppResult<Self> {
        let order = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("order not found".into()))?;
        if !order.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!("cannot move order from {} to {}", order.status, next)));
        }

        let mut tx = db.begin().await?;
        let now = now_ts();
        let res = sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4")
            .bind(next.as_str())
            .bind(&now)
            .bind(id.to_string())
            .bind(order.status.as_str())
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::Conflict("order was modified concurrently, please retry".into()));
        }
        if next == OrderStatus::Cancelled {
            for item in &order.items {
                sqlx::query("UPDATE products SET stock_quantity = stock_quantity + ?1, updated_at = ?2 WHERE id = ?3")
                    .bind(item.quantity)
                    .bind(&now)
                    .bind(item.product_id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;

        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("order not found".into()))
    }

    pub async fn set_payment_status(db: &SqlitePool, id: Uuid, status: PaymentStatus) -> AppResult<Self> {
        let res = sqlx::query("UPDATE orders SET payment_status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(now_ts())
            .bind(id.to_string())
            .execute(db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("order not found".into()));
        }
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("order not found".into()))
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &OrderFilter, scope: &OrderScope) {
        qb.push(" WHERE 1=1");
        match scope {
            OrderScope::All => {}
            OrderScope::Buyer(buyer) => {
                qb.push(" AND buyer_id = ").push_bind(buyer.to_string());
            }
            OrderScope::Shops(shops) if shops.is_empty() => {
                qb.push(" AND 1=0");
            }
            OrderScope::Shops(shops) => {
                qb.push(" AND shop_id IN (");
                let mut sep = qb.separated(", ");
                for s in shops {
                    sep.push_bind(s.to_string());
                }
                sep.push_unseparated(")");
            }
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(ps) = filter.payment_status {
            qb.push(" AND payment_status = ").push_bind(ps.as_str());
        }
        if let Some(shop_id) = filter.shop_id {
            qb.push(" AND shop_id = ").push_bind(shop_id.to_string());
        }
        if let Some(buyer_id) = filter.buyer_id {
            qb.push(" AND buyer_id = ").push_bind(buyer_id.to_string());
        }
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &OrderFilter,
        scope: &OrderScope,
        sort: &PageQuery,
        page: Page,
    ) -> AppResult<(Vec<Self>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM orders");
        Self::push_filters(&mut count, filter, scope);
        let total: i64 = count.build().fetch_one(db).await?.try_get("cnt")?;

        let column = sort.sort_column(&[("created_at", "created_at"), ("total_amount", "total_amount")]);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM orders", COLUMNS));
        Self::push_filters(&mut qb, filter, scope);
        qb.push(format!(" ORDER BY {} {}, id ASC", column, sort.order.as_sql()))
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(db).await?;
        let items = rows.iter().map(Self::from_row).collect::<AppResult<Vec<_>>>()?;
        Ok((items, total))
    }

    pub async fn stats(db: &SqlitePool) -> AppResult<OrderStats> {
        let mut by_status: BTreeMap<String, i64> =
            OrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let rows = sqlx::query("SELECT status, COUNT(*) AS cnt FROM orders GROUP BY status").fetch_all(db).await?;
        for r in &rows {
            by_status.insert(r.try_get("status")?, r.try_get("cnt")?);
        }
        let delivered_revenue: f64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(total_amount), 0.0) FROM orders WHERE status = 'delivered'")
                .fetch_one(db)
                .await?;
        Ok(OrderStats {
            total: by_status.values().sum(),
            by_status,
            delivered_revenue: round_money(delivered_revenue),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));

        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(Delivered.is_terminal() && Cancelled.is_terminal());
        assert!(!Processing.is_terminal());
    }

    #[test]
    fn test_order_number_format() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        let at = DateTime::parse_from_rfc3339("2026-03-09T10:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(order_number(id, at), "ORD-20260309-A1B2C3D4");
    }

    #[test]
    fn test_create_validation() {
        let pid = Uuid::new_v4();
        let ok = CreateOrderRequest {
            shop_id: None,
            items: vec![OrderLine { product_id: pid, quantity: 2 }],
            delivery_address: None,
            notes: None,
        };
        assert!(ok.validate().is_ok());

        let empty = CreateOrderRequest { items: vec![], ..ok.clone() };
        assert!(empty.validate().is_err());

        let zero = CreateOrderRequest { items: vec![OrderLine { product_id: pid, quantity: 0 }], ..ok.clone() };
        assert!(zero.validate().is_err());

        let dup = CreateOrderRequest {
            items: vec![OrderLine { product_id: pid, quantity: 1 }, OrderLine { product_id: pid, quantity: 3 }],
            ..ok
        };
        assert!(dup.validate().is_err());
    }

    #[test]
    fn test_round_money() {
        assert_eq!(round_money(0.1 + 0.2), 0.3);
        assert_eq!(round_money(3 as f64 * 33.333), 100.0);
    }
}
