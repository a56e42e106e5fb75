use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::user::{User, UserRole};
use super::validate::{self, Validate};
use super::{now_ts, parse_enum, parse_id, parse_json_list, parse_opt_id, parse_opt_ts, parse_ts, ts};
use crate::error::{AppError, AppResult};
use crate::types::{contains_pattern, Page, PageQuery};

string_enum! {
    ReportType {
        FieldVisit => "field_visit",
        CropAssessment => "crop_assessment",
        PestOutbreak => "pest_outbreak",
        MarketSurvey => "market_survey",
        Incident => "incident",
        MonthlySummary => "monthly_summary",
    }
}

string_enum! {
    ReportStatus {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

string_enum! {
    Priority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl ReportStatus {
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Completed) | (Pending, Cancelled) | (InProgress, Completed) | (InProgress, Cancelled)
        )
    }

    pub fn is_open(self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::InProgress)
    }
}

const PRIORITY_RANK: &str =
    "CASE priority WHEN 'urgent' THEN 4 WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END";

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    pub report_type: ReportType,
    pub description: String,
    pub farmer_id: Option<Uuid>,
    pub author_id: Uuid,
    pub status: ReportStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub findings: Option<String>,
    pub recommendations: Vec<String>,
    pub is_overdue: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub title: String,
    pub report_type: ReportType,
    pub description: String,
    pub farmer_id: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub findings: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReportRequest {
    pub title: Option<String>,
    pub report_type: Option<ReportType>,
    pub description: Option<String>,
    pub farmer_id: Option<Uuid>,
    pub status: Option<ReportStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub findings: Option<String>,
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteReportRequest {
    pub findings: Option<String>,
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub report_type: Option<ReportType>,
    pub priority: Option<Priority>,
    pub author_id: Option<Uuid>,
    pub farmer_id: Option<Uuid>,
    pub overdue: Option<bool>,
    pub search: Option<String>,
}

/// Which reports a caller may see.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportScope {
    All,
    Author(Uuid),
    Farmer(Uuid),
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    pub overdue: i64,
}

fn validate_fields(
    title: &str,
    description: &str,
    findings: Option<&str>,
    recommendations: &[String],
) -> AppResult<()> {
    validate::length("title", title, 3, 200)?;
    validate::length("description", description, 10, 5000)?;
    validate::max_length("findings", findings, 5000)?;
    validate::string_list("recommendations", recommendations, 0, 20, 500)?;
    Ok(())
}

impl Validate for CreateReportRequest {
    fn validate(&self) -> AppResult<()> {
        validate_fields(&self.title, &self.description, self.findings.as_deref(), &self.recommendations)?;
        if let Some(due) = self.due_date {
            if due < Utc::now() {
                return Err(AppError::invalid_field("due_date", "must not be in the past"));
            }
        }
        Ok(())
    }
}

impl Validate for Report {
    fn validate(&self) -> AppResult<()> {
        validate_fields(&self.title, &self.description, self.findings.as_deref(), &self.recommendations)
    }
}

fn overdue(status: ReportStatus, due_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    status.is_open() && due_date.is_some_and(|d| d < now)
}

/// Reports may only be filed about farmer accounts.
async fn ensure_farmer(db: &SqlitePool, farmer_id: Uuid) -> AppResult<()> {
    match User::find_by_id(db, farmer_id).await? {
        Some(u) if u.role == UserRole::Farmer => Ok(()),
        Some(_) => Err(AppError::invalid_field("farmer_id", "must reference a farmer")),
        None => Err(AppError::invalid_field("farmer_id", "user does not exist")),
    }
}

const COLUMNS: &str = "id, title, report_type, description, farmer_id, author_id, status, priority, due_date, \
     completed_at, findings, recommendations, created_at, updated_at";

impl Report {
    fn from_row(r: &SqliteRow) -> AppResult<Self> {
        let status: ReportStatus = parse_enum(&r.try_get::<String, _>("status")?)?;
        let due_date = parse_opt_ts(r.try_get("due_date")?)?;
        Ok(Self {
            id: parse_id(&r.try_get::<String, _>("id")?)?,
            title: r.try_get("title")?,
            report_type: parse_enum(&r.try_get::<String, _>("report_type")?)?,
            description: r.try_get("description")?,
            farmer_id: parse_opt_id(r.try_get("farmer_id")?)?,
            author_id: parse_id(&r.try_get::<String, _>("author_id")?)?,
            status,
            priority: parse_enum(&r.try_get::<String, _>("priority")?)?,
            due_date,
            completed_at: parse_opt_ts(r.try_get("completed_at")?)?,
            findings: r.try_get("findings")?,
            recommendations: parse_json_list(&r.try_get::<String, _>("recommendations")?)?,
            is_overdue: overdue(status, due_date, Utc::now()),
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    pub async fn insert(db: &SqlitePool, author_id: Uuid, req: &CreateReportRequest) -> AppResult<Self> {
        if let Some(farmer_id) = req.farmer_id {
            ensure_farmer(db, farmer_id).await?;
        }
        let recommendations = validate::dedup_trimmed(req.recommendations.clone());
        let id = Uuid::new_v4();
        let now = now_ts();
        sqlx::query(
            r#"INSERT INTO reports (id, title, report_type, description, farmer_id, author_id, status, priority,
                   due_date, completed_at, findings, recommendations, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, NULL, ?9, ?10, ?11, ?11)"#,
        )
        .bind(id.to_string())
        .bind(req.title.trim())
        .bind(req.report_type.as_str())
        .bind(req.description.trim())
        .bind(req.farmer_id.map(|f| f.to_string()))
        .bind(author_id.to_string())
        .bind(req.priority.unwrap_or(Priority::Medium).as_str())
        .bind(req.due_date.map(ts))
        .bind(validate::blank_to_none(req.findings.clone()))
        .bind(serde_json::to_string(&recommendations)?)
        .bind(&now)
        .execute(db)
        .await?;
        Self::find_by_id(db, id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("report vanished after insert")))
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM reports WHERE id = ?1", COLUMNS))
            .bind(id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Writes `r` back only if the stored status is still `read_status`.
    async fn save(db: &SqlitePool, r: &Report, read_status: ReportStatus) -> AppResult<Self> {
        let res = sqlx::query(
            r#"UPDATE reports SET title=?1, report_type=?2, description=?3, farmer_id=?4, status=?5, priority=?6,
                   due_date=?7, completed_at=?8, findings=?9, recommendations=?10, updated_at=?11
               WHERE id=?12 AND status=?13"#,
        )
        .bind(&r.title)
        .bind(r.report_type.as_str())
        .bind(&r.description)
        .bind(r.farmer_id.map(|f| f.to_string()))
        .bind(r.status.as_str())
        .bind(r.priority.as_str())
        .bind(r.due_date.map(ts))
        .bind(r.completed_at.map(ts))
        .bind(&r.findings)
        .bind(serde_json::to_string(&r.recommendations)?)
        .bind(now_ts())
        .bind(r.id.to_string())
        .bind(read_status.as_str())
        .execute(db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::Conflict("report was modified concurrently, please retry".into()));
        }
        Self::find_by_id(db, r.id).await?.ok_or_else(|| AppError::NotFound("report not found".into()))
    }

    fn apply_status(&mut self, next: ReportStatus) -> AppResult<()> {
        if next == self.status {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!("cannot move report from {} to {}", self.status, next)));
        }
        self.status = next;
        if next == ReportStatus::Completed {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub async fn update(db: &SqlitePool, id: Uuid, req: UpdateReportRequest) -> AppResult<Self> {
        let mut r = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("report not found".into()))?;
        let read_status = r.status;
        if let Some(v) = req.title {
            r.title = v.trim().to_string();
        }
        if let Some(v) = req.report_type {
            r.report_type = v;
        }
        if let Some(v) = req.description {
            r.description = v.trim().to_string();
        }
        if let Some(farmer_id) = req.farmer_id {
            if Some(farmer_id) != r.farmer_id {
                ensure_farmer(db, farmer_id).await?;
                r.farmer_id = Some(farmer_id);
            }
        }
        if let Some(v) = req.priority {
            r.priority = v;
        }
        if req.due_date.is_some() {
            r.due_date = req.due_date;
        }
        if req.findings.is_some() {
            r.findings = validate::blank_to_none(req.findings);
        }
        if let Some(v) = req.recommendations {
            r.recommendations = validate::dedup_trimmed(v);
        }
        if let Some(next) = req.status {
            r.apply_status(next)?;
        }
        r.validate()?;
        Self::save(db, &r, read_status).await
    }

    /// Closes the report, stamping `completed_at` and recording the final findings.
    pub async fn complete(db: &SqlitePool, id: Uuid, req: CompleteReportRequest) -> AppResult<Self> {
        let mut r = Self::find_by_id(db, id).await?.ok_or_else(|| AppError::NotFound("report not found".into()))?;
        let read_status = r.status;
        if r.status == ReportStatus::Completed {
            return Err(AppError::Conflict("report is already completed".into()));
        }
        r.apply_status(ReportStatus::Completed)?;
        if req.findings.is_some() {
            r.findings = validate::blank_to_none(req.findings);
        }
        if let Some(v) = req.recommendations {
            r.recommendations = validate::dedup_trimmed(v);
        }
        r.validate()?;
        Self::save(db, &r, read_status).await
    }

    pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM reports WHERE id = ?1").bind(id.to_string()).execute(db).await?;
        Ok(res.rows_affected() > 0)
    }

    fn push_overdue(qb: &mut QueryBuilder<'_, Sqlite>, now: String) {
        qb.push("(status IN ('pending', 'in_progress') AND due_date IS NOT NULL AND due_date < ")
            .push_bind(now)
            .push(")");
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ReportFilter, scope: ReportScope) {
        qb.push(" WHERE 1=1");
        match scope {
            ReportScope::All => {}
            ReportScope::Author(id) => {
                qb.push(" AND author_id = ").push_bind(id.to_string());
            }
            ReportScope::Farmer(id) => {
                qb.push(" AND farmer_id = ").push_bind(id.to_string());
            }
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(t) = filter.report_type {
            qb.push(" AND report_type = ").push_bind(t.as_str());
        }
        if let Some(p) = filter.priority {
            qb.push(" AND priority = ").push_bind(p.as_str());
        }
        if let Some(author) = filter.author_id {
            qb.push(" AND author_id = ").push_bind(author.to_string());
        }
        if let Some(farmer) = filter.farmer_id {
            qb.push(" AND farmer_id = ").push_bind(farmer.to_string());
        }
        match filter.overdue {
            Some(true) => {
                qb.push(" AND ");
                Self::push_overdue(qb, now_ts());
            }
            Some(false) => {
                qb.push(" AND NOT ");
                Self::push_overdue(qb, now_ts());
            }
            None => {}
        }
        if let Some(pattern) = contains_pattern(filter.search.as_deref()) {
            qb.push(" AND (title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '!' OR description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '!')");
        }
    }

    pub async fn list(
        db: &SqlitePool,
        filter: &ReportFilter,
        scope: ReportScope,
        sort: &PageQuery,
        page: Page,
    ) -> AppResult<(Vec<Self>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM reports");
        Self::push_filters(&mut count, filter, scope);
        let total: i64 = count.build().fetch_one(db).await?.try_get("cnt")?;

        let column = sort.sort_column(&[("created_at", "created_at"), ("due_date", "due_date"), ("priority", PRIORITY_RANK)]);
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM reports", COLUMNS));
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

    /// Open reports past their due date, most overdue first.
    pub async fn find_overdue(db: &SqlitePool, scope: ReportScope, limit: i64) -> AppResult<Vec<Self>> {
        let filter = ReportFilter { overdue: Some(true), ..Default::default() };
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM reports", COLUMNS));
        Self::push_filters(&mut qb, &filter, scope);
        qb.push(" ORDER BY due_date ASC, id ASC LIMIT ").push_bind(limit);
        let rows = qb.build().fetch_all(db).await?;
        rows.iter().map(Self::from_row).collect()
    }

    pub async fn stats(db: &SqlitePool, scope: ReportScope) -> AppResult<ReportStats> {
        let mut by_status: BTreeMap<String, i64> =
            ReportStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let mut by_priority: BTreeMap<String, i64> =
            Priority::ALL.iter().map(|p| (p.as_str().to_string(), 0)).collect();

        let none = ReportFilter::default();
        for (column, target) in [("status", &mut by_status), ("priority", &mut by_priority)] {
            let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} AS k, COUNT(*) AS cnt FROM reports", column));
            Self::push_filters(&mut qb, &none, scope);
            qb.push(format!(" GROUP BY {}", column));
            for r in qb.build().fetch_all(db).await? {
                target.insert(r.try_get("k")?, r.try_get("cnt")?);
            }
        }

        let overdue_filter = ReportFilter { overdue: Some(true), ..Default::default() };
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM reports");
        Self::push_filters(&mut qb, &overdue_filter, scope);
        let overdue: i64 = qb.build().fetch_one(db).await?.try_get("cnt")?;

        Ok(ReportStats { total: by_status.values().sum(), by_status, by_priority, overdue })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> CreateReportRequest {
        CreateReportRequest {
            title: "Maize lethal necrosis check".into(),
            report_type: ReportType::CropAssessment,
            description: "Inspected 3 plots for MLN symptoms after farmer call.".into(),
            farmer_id: None,
            priority: None,
            due_date: None,
            findings: None,
            recommendations: vec![],
        }
    }

    #[test]
    fn test_report_transitions() {
        use ReportStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(Pending.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn test_overdue_only_for_open_reports() {
        let now = Utc::now();
        let yesterday = Some(now - Duration::days(1));
        assert!(overdue(ReportStatus::Pending, yesterday, now));
        assert!(overdue(ReportStatus::InProgress, yesterday, now));
        assert!(!overdue(ReportStatus::Completed, yesterday, now));
        assert!(!overdue(ReportStatus::Pending, Some(now + Duration::days(1)), now));
        assert!(!overdue(ReportStatus::Pending, None, now));
    }

    #[test]
    fn test_create_validation() {
        assert!(request().validate().is_ok());

        let mut r = request();
        r.description = "short".into();
        assert!(r.validate().is_err());

        let mut r = request();
        r.due_date = Some(Utc::now() - Duration::days(2));
        assert!(r.validate().is_err());

        let mut r = request();
        r.recommendations = (0..21).map(|i| format!("step {}", i)).collect();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_enum_text() {
        assert_eq!(ReportType::PestOutbreak.as_str(), "pest_outbreak");
        assert_eq!("in_progress".parse::<ReportStatus>().unwrap(), ReportStatus::InProgress);
        assert!("critical".parse::<Priority>().is_err());
    }
}
