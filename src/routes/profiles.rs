use axum::extract::State;
use uuid::Uuid;

use super::paged;
use crate::error::{AppError, AppResult, OptionExt};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::profile::{
    AgentFilter, AgentProfile, AssignAgentRequest, FarmerProfile, UpsertAgentProfileRequest,
    UpsertFarmerProfileRequest,
};
use crate::models::user::UserRole;
use crate::models::validate::Validate;
use crate::state::AppState;
use crate::types::{ApiResponse, PageQuery};

pub async fn my_farmer_profile(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AppResult<ApiResponse<FarmerProfile>> {
    caller.require_role(&[UserRole::Farmer])?;
    let profile = FarmerProfile::find(&state.db, caller.id).await?.ok_or_not_found("farmer profile")?;
    Ok(ApiResponse::ok(profile))
}

pub async fn upsert_farmer_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<UpsertFarmerProfileRequest>,
) -> AppResult<ApiResponse<FarmerProfile>> {
    caller.require_role(&[UserRole::Farmer])?;
    req.validate()?;
    let profile = FarmerProfile::upsert(&state.db, caller.id, &req).await?;
    Ok(ApiResponse::ok(profile).with_message("Farmer profile saved"))
}

pub async fn get_farmer_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<FarmerProfile>> {
    if caller.id != user_id {
        caller.require_role(&[UserRole::Agent, UserRole::Admin])?;
    }
    let profile = FarmerProfile::find(&state.db, user_id).await?.ok_or_not_found("farmer profile")?;
    Ok(ApiResponse::ok(profile))
}

pub async fn assign_agent(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(farmer_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AssignAgentRequest>,
) -> AppResult<ApiResponse<FarmerProfile>> {
    caller.require_role(&[UserRole::Admin])?;
    let profile = FarmerProfile::assign_agent(&state.db, farmer_id, req.agent_id).await?;
    tracing::info!(farmer = %farmer_id, agent = %req.agent_id, by = %caller.id, "agent assigned");
    Ok(ApiResponse::ok(profile).with_message("Agent assigned"))
}

pub async fn my_agent_profile(
    State(state): State<AppState>,
    caller: AuthUser,
) -> AppResult<ApiResponse<AgentProfile>> {
    caller.require_role(&[UserRole::Agent])?;
    let profile = AgentProfile::find(&state.db, caller.id).await?.ok_or_not_found("agent profile")?;
    Ok(ApiResponse::ok(profile))
}

pub async fn upsert_agent_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<UpsertAgentProfileRequest>,
) -> AppResult<ApiResponse<AgentProfile>> {
    caller.require_role(&[UserRole::Agent])?;
    req.validate()?;
    let profile = AgentProfile::upsert(&state.db, caller.id, &req).await.map_err(|e| match e {
        AppError::Conflict(_) => AppError::Conflict(format!("employee id {} is already taken", req.employee_id.trim())),
        other => other,
    })?;
    Ok(ApiResponse::ok(profile).with_message("Agent profile saved"))
}

pub async fn my_assigned_farmers(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
) -> AppResult<ApiResponse<Vec<FarmerProfile>>> {
    caller.require_role(&[UserRole::Agent])?;
    let page = q.page(&state.config.pagination);
    Ok(paged(FarmerProfile::assigned_to(&state.db, caller.id, page).await?, page))
}

pub async fn list_agents(
    State(state): State<AppState>,
    _caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<AgentFilter>,
) -> AppResult<ApiResponse<Vec<AgentProfile>>> {
    let page = q.page(&state.config.pagination);
    Ok(paged(AgentProfile::list(&state.db, &filter, page).await?, page))
}
