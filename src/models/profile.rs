use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::user::{User, UserRole};
use super::validate::{self, Validate, EMPLOYEE_ID_RE};
use super::{now_ts, parse_enum, parse_id, parse_json_list, parse_opt_id, parse_ts, rating_description};
use crate::error::{AppError, AppResult};
use crate::types::Page;

string_enum! {
    IrrigationType {
        Rainfed => "rainfed",
        Drip => "drip",
        Sprinkler => "sprinkler",
        Flood => "flood",
        None => "none",
    }
}

string_enum! {
    Availability {
        Available => "available",
        Busy => "busy",
        OnLeave => "on_leave",
    }
}

impl Default for IrrigationType {
    fn default() -> Self {
        IrrigationType::Rainfed
    }
}

impl Default for Availability {
    fn default() -> Self {
        Availability::Available
    }
}

pub const MAX_FARM_HECTARES: f64 = 100_000.0;
pub const DEFAULT_MAX_FARMERS: i64 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct FarmerProfile {
    pub user_id: Uuid,
    pub farm_name: String,
    pub village: Option<String>,
    pub district: String,
    pub region: String,
    pub farm_size_hectares: f64,
    pub crops: Vec<String>,
    pub livestock: Vec<String>,
    pub irrigation_type: IrrigationType,
    pub years_experience: i64,
    pub cooperative: Option<String>,
    pub assigned_agent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub user_id: Uuid,
    pub employee_id: String,
    pub region: String,
    pub districts: Vec<String>,
    pub specializations: Vec<String>,
    pub years_experience: i64,
    pub rating: f64,
    pub rating_description: &'static str,
    pub max_farmers: i64,
    pub assigned_farmers: i64,
    pub availability: Availability,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertFarmerProfileRequest {
    pub farm_name: String,
    pub village: Option<String>,
    pub district: String,
    pub region: String,
    pub farm_size_hectares: f64,
    #[serde(default)]
    pub crops: Vec<String>,
    #[serde(default)]
    pub livestock: Vec<String>,
    #[serde(default)]
    pub irrigation_type: IrrigationType,
    #[serde(default)]
    pub years_experience: i64,
    pub cooperative: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertAgentProfileRequest {
    pub employee_id: String,
    pub region: String,
    pub districts: Vec<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub years_experience: i64,
    pub max_farmers: Option<i64>,
    #[serde(default)]
    pub availability: Availability,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignAgentRequest {
    pub agent_id: Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentFilter {
    pub region: Option<String>,
    pub availability: Option<Availability>,
}

impl Validate for UpsertFarmerProfileRequest {
    fn validate(&self) -> AppResult<()> {
        validate::length("farm_name", &self.farm_name, 2, 120)?;
        validate::max_length("village", self.village.as_deref(), 100)?;
        validate::length("district", &self.district, 2, 100)?;
        validate::length("region", &self.region, 2, 100)?;
        validate::positive("farm_size_hectares", self.farm_size_hectares, MAX_FARM_HECTARES)?;
        validate::string_list("crops", &self.crops, 0, 20, 60)?;
        validate::string_list("livestock", &self.livestock, 0, 20, 60)?;
        validate::range("years_experience", self.years_experience, 0, 80)?;
        validate::max_length("cooperative", self.cooperative.as_deref(), 120)?;
        Ok(())
    }
}

impl Validate for UpsertAgentProfileRequest {
    fn validate(&self) -> AppResult<()> {
        validate::pattern("employee_id", self.employee_id.trim(), &EMPLOYEE_ID_RE, "e.g. EXT-00123")?;
        validate::length("region", &self.region, 2, 100)?;
        validate::string_list("districts", &self.districts, 1, 20, 100)?;
        validate::string_list("specializations", &self.specializations, 0, 10, 100)?;
        validate::range("years_experience", self.years_experience, 0, 60)?;
        if let Some(max) = self.max_farmers {
            validate::range("max_farmers", max, 1, 500)?;
        }
        Ok(())
    }
}

const FARMER_COLUMNS: &str = "user_id, farm_name, village, district, region, farm_size_hectares, crops, livestock, \
     irrigation_type, years_experience, cooperative, assigned_agent_id, created_at, updated_at";

const AGENT_COLUMNS: &str = "a.user_id, a.employee_id, a.region, a.districts, a.specializations, a.years_experience, \
     a.rating, a.max_farmers, a.availability, a.created_at, a.updated_at, \
     (SELECT COUNT(*) FROM farmer_profiles f WHERE f.assigned_agent_id = a.user_id) AS assigned_farmers";

impl FarmerProfile {
    fn from_row(r: &SqliteRow) -> AppResult<Self> {
        Ok(Self {
            user_id: parse_id(&r.try_get::<String, _>("user_id")?)?,
            farm_name: r.try_get("farm_name")?,
            village: r.try_get("village")?,
            district: r.try_get("district")?,
            region: r.try_get("region")?,
            farm_size_hectares: r.try_get("farm_size_hectares")?,
            crops: parse_json_list(&r.try_get::<String, _>("crops")?)?,
            livestock: parse_json_list(&r.try_get::<String, _>("livestock")?)?,
            irrigation_type: parse_enum(&r.try_get::<String, _>("irrigation_type")?)?,
            years_experience: r.try_get("years_experience")?,
            cooperative: r.try_get("cooperative")?,
            assigned_agent_id: parse_opt_id(r.try_get("assigned_agent_id")?)?,
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    pub async fn find(db: &SqlitePool, user_id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM farmer_profiles WHERE user_id = ?1", FARMER_COLUMNS))
            .bind(user_id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Creates or replaces the farm details. The assigned agent is left untouched.
    pub async fn upsert(db: &SqlitePool, user_id: Uuid, req: &UpsertFarmerProfileRequest) -> AppResult<Self> {
        let now = now_ts();
        sqlx::query(
            r#"INSERT INTO farmer_profiles (user_id, farm_name, village, district, region, farm_size_hectares, crops,
                   livestock, irrigation_type, years_experience, cooperative, assigned_agent_id, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, ?12, ?12)
               ON CONFLICT(user_id) DO UPDATE SET
                   farm_name = excluded.farm_name,
                   village = excluded.village,
                   district = excluded.district,
                   region = excluded.region,
                   farm_size_hectares = excluded.farm_size_hectares,
                   crops = excluded.crops,
                   livestock = excluded.livestock,
                   irrigation_type = excluded.irrigation_type,
                   years_experience = excluded.years_experience,
                   cooperative = excluded.cooperative,
                   updated_at = excluded.updated_at"#,
        )
        .bind(user_id.to_string())
        .bind(req.farm_name.trim())
        .bind(validate::blank_to_none(req.village.clone()))
        .bind(req.district.trim())
        .bind(req.region.trim())
        .bind(req.farm_size_hectares)
        .bind(serde_json::to_string(&validate::dedup_trimmed(req.crops.clone()))?)
        .bind(serde_json::to_string(&validate::dedup_trimmed(req.livestock.clone()))?)
        .bind(req.irrigation_type.as_str())
        .bind(req.years_experience)
        .bind(validate::blank_to_none(req.cooperative.clone()))
        .bind(&now)
        .execute(db)
        .await?;
        Self::find(db, user_id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("farmer profile vanished after upsert")))
    }

    /// Hands the farmer to an extension agent, respecting the agent's caseload limit.
    pub async fn assign_agent(db: &SqlitePool, farmer_id: Uuid, agent_id: Uuid) -> AppResult<Self> {
        let profile = Self::find(db, farmer_id).await?.ok_or_else(|| AppError::NotFound("farmer profile not found".into()))?;
        if profile.assigned_agent_id == Some(agent_id) {
            return Ok(profile);
        }

        match User::find_by_id(db, agent_id).await? {
            Some(u) if u.role == UserRole::Agent && u.is_active => {}
            Some(_) => return Err(AppError::invalid_field("agent_id", "must reference an active agent")),
            None => return Err(AppError::invalid_field("agent_id", "user does not exist")),
        }
        let agent = AgentProfile::find(db, agent_id)
            .await?
            .ok_or_else(|| AppError::invalid_field("agent_id", "agent has no profile yet"))?;
        if agent.assigned_farmers >= agent.max_farmers {
            return Err(AppError::Conflict(format!(
                "agent already serves {} of {} farmers",
                agent.assigned_farmers, agent.max_farmers
            )));
        }

        // Capacity is checked again in the WHERE clause; a lost race matches no row
        let res = sqlx::query(
            "UPDATE farmer_profiles SET assigned_agent_id = ?1, updated_at = ?2
             WHERE user_id = ?3
               AND (SELECT COUNT(*) FROM farmer_profiles WHERE assigned_agent_id = ?1)
                   < (SELECT max_farmers FROM agent_profiles WHERE user_id = ?1)",
        )
        .bind(agent_id.to_string())
        .bind(now_ts())
        .bind(farmer_id.to_string())
        .execute(db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::Conflict(format!("agent has no capacity left ({} farmers max)", agent.max_farmers)));
        }
        Self::find(db, farmer_id).await?.ok_or_else(|| AppError::NotFound("farmer profile not found".into()))
    }

    pub async fn assigned_to(db: &SqlitePool, agent_id: Uuid, page: Page) -> AppResult<(Vec<Self>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM farmer_profiles WHERE assigned_agent_id = ?1")
            .bind(agent_id.to_string())
            .fetch_one(db)
            .await?;
        let rows = sqlx::query(&format!(
            "SELECT {} FROM farmer_profiles WHERE assigned_agent_id = ?1 ORDER BY farm_name ASC, user_id ASC LIMIT ?2 OFFSET ?3",
            FARMER_COLUMNS
        ))
        .bind(agent_id.to_string())
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(db)
        .await?;
        let items = rows.iter().map(Self::from_row).collect::<AppResult<Vec<_>>>()?;
        Ok((items, total))
    }
}

impl AgentProfile {
    fn from_row(r: &SqliteRow) -> AppResult<Self> {
        let rating: f64 = r.try_get("rating")?;
        Ok(Self {
            user_id: parse_id(&r.try_get::<String, _>("user_id")?)?,
            employee_id: r.try_get("employee_id")?,
            region: r.try_get("region")?,
            districts: parse_json_list(&r.try_get::<String, _>("districts")?)?,
            specializations: parse_json_list(&r.try_get::<String, _>("specializations")?)?,
            years_experience: r.try_get("years_experience")?,
            rating,
            rating_description: rating_description(rating),
            max_farmers: r.try_get("max_farmers")?,
            assigned_farmers: r.try_get("assigned_farmers")?,
            availability: parse_enum(&r.try_get::<String, _>("availability")?)?,
            created_at: parse_ts(&r.try_get::<String, _>("created_at")?)?,
            updated_at: parse_ts(&r.try_get::<String, _>("updated_at")?)?,
        })
    }

    pub async fn find(db: &SqlitePool, user_id: Uuid) -> AppResult<Option<Self>> {
        let row = sqlx::query(&format!("SELECT {} FROM agent_profiles a WHERE a.user_id = ?1", AGENT_COLUMNS))
            .bind(user_id.to_string())
            .fetch_optional(db)
            .await?;
        row.as_ref().map(Self::from_row).transpose()
    }

    /// Creates or replaces the agent's details. The rating is only changed by reviews.
    pub async fn upsert(db: &SqlitePool, user_id: Uuid, req: &UpsertAgentProfileRequest) -> AppResult<Self> {
        let now = now_ts();
        sqlx::query(
            r#"INSERT INTO agent_profiles (user_id, employee_id, region, districts, specializations, years_experience,
                   rating, max_farmers, availability, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9, ?9)
               ON CONFLICT(user_id) DO UPDATE SET
                   employee_id = excluded.employee_id,
                   region = excluded.region,
                   districts = excluded.districts,
                   specializations = excluded.specializations,
                   years_experience = excluded.years_experience,
                   max_farmers = excluded.max_farmers,
                   availability = excluded.availability,
                   updated_at = excluded.updated_at"#,
        )
        .bind(user_id.to_string())
        .bind(req.employee_id.trim())
        .bind(req.region.trim())
        .bind(serde_json::to_string(&validate::dedup_trimmed(req.districts.clone()))?)
        .bind(serde_json::to_string(&validate::dedup_trimmed(req.specializations.clone()))?)
        .bind(req.years_experience)
        .bind(req.max_farmers.unwrap_or(DEFAULT_MAX_FARMERS))
        .bind(req.availability.as_str())
        .bind(&now)
        .execute(db)
        .await?;
        Self::find(db, user_id).await?.ok_or_else(|| AppError::Internal(anyhow::anyhow!("agent profile vanished after upsert")))
    }

    fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &AgentFilter) {
        qb.push(" WHERE 1=1");
        if let Some(region) = filter.region.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND a.region = ").push_bind(region.to_string()).push(" COLLATE NOCASE");
        }
        if let Some(a) = filter.availability {
            qb.push(" AND a.availability = ").push_bind(a.as_str());
        }
    }

    pub async fn list(db: &SqlitePool, filter: &AgentFilter, page: Page) -> AppResult<(Vec<Self>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS cnt FROM agent_profiles a");
        Self::push_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(db).await?.try_get("cnt")?;

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM agent_profiles a", AGENT_COLUMNS));
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY a.rating DESC, a.employee_id ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows = qb.build().fetch_all(db).await?;
        let items = rows.iter().map(Self::from_row).collect::<AppResult<Vec<_>>>()?;
        Ok((items, total))
    }
}
