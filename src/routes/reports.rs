use axum::{body::Bytes, extract::State};
use uuid::Uuid;

use super::paged;
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::models::report::{
    CompleteReportRequest, CreateReportRequest, Report, ReportFilter, ReportScope, ReportStats, UpdateReportRequest,
};
use crate::models::user::UserRole;
use crate::models::validate::Validate;
use crate::state::AppState;
use crate::types::{ApiResponse, LimitQuery, PageQuery};

fn scope_for(caller: &AuthUser) -> AppResult<ReportScope> {
    match caller.role {
        UserRole::Admin => Ok(ReportScope::All),
        UserRole::Agent => Ok(ReportScope::Author(caller.id)),
        UserRole::Farmer => Ok(ReportScope::Farmer(caller.id)),
        UserRole::ShopManager => Err(AppError::Forbidden("field reports are not available to shop managers".into())),
    }
}

fn in_scope(report: &Report, scope: ReportScope) -> bool {
    match scope {
        ReportScope::All => true,
        ReportScope::Author(id) => report.author_id == id,
        ReportScope::Farmer(id) => report.farmer_id == Some(id),
    }
}

async fn visible_report(state: &AppState, caller: &AuthUser, id: Uuid) -> AppResult<Report> {
    let scope = scope_for(caller)?;
    match Report::find_by_id(&state.db, id).await? {
        Some(report) if in_scope(&report, scope) => Ok(report),
        _ => Err(AppError::NotFound("report not found".into())),
    }
}

/// The author and admins may edit; everyone else who can see the report may only read it.
async fn editable_report(state: &AppState, caller: &AuthUser, id: Uuid) -> AppResult<Report> {
    let report = visible_report(state, caller, id).await?;
    if !caller.is_admin() && report.author_id != caller.id {
        return Err(AppError::Forbidden("only the author or an admin may modify this report".into()));
    }
    Ok(report)
}

pub async fn list_reports(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(q): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<ReportFilter>,
) -> AppResult<ApiResponse<Vec<Report>>> {
    let scope = scope_for(&caller)?;
    let page = q.page(&state.config.pagination);
    Ok(paged(Report::list(&state.db, &filter, scope, &q, page).await?, page))
}

pub async fn overdue_reports(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> AppResult<ApiResponse<Vec<Report>>> {
    let scope = scope_for(&caller)?;
    let limit = q.limit(&state.config.pagination);
    Ok(ApiResponse::ok(Report::find_overdue(&state.db, scope, limit).await?))
}

pub async fn report_stats(State(state): State<AppState>, caller: AuthUser) -> AppResult<ApiResponse<ReportStats>> {
    let scope = scope_for(&caller)?;
    Ok(ApiResponse::ok(Report::stats(&state.db, scope).await?))
}

pub async fn get_report(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<Report>> {
    Ok(ApiResponse::ok(visible_report(&state, &caller, id).await?))
}

pub async fn create_report(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(req): ApiJson<CreateReportRequest>,
) -> AppResult<ApiResponse<Report>> {
    caller.require_role(&[UserRole::Agent, UserRole::Admin])?;
    req.validate()?;
    let report = Report::insert(&state.db, caller.id, &req).await?;
    state.metrics.inc_reports_filed();
    tracing::info!(report_id = %report.id, author = %caller.id, kind = %report.report_type, "report filed");
    Ok(ApiResponse::created(report).with_message("Report created"))
}

pub async fn update_report(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateReportRequest>,
) -> AppResult<ApiResponse<Report>> {
    editable_report(&state, &caller, id).await?;
    let report = Report::update(&state.db, id, req).await?;
    Ok(ApiResponse::ok(report).with_message("Report updated"))
}

/// The body is optional: an empty request just closes the report.
pub async fn complete_report(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> AppResult<ApiResponse<Report>> {
    let req: CompleteReportRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CompleteReportRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidInput(format!("invalid JSON body: {}", e)))?
    };
    editable_report(&state, &caller, id).await?;
    let report = Report::complete(&state.db, id, req).await?;
    tracing::info!(report_id = %report.id, by = %caller.id, "report completed");
    Ok(ApiResponse::ok(report).with_message("Report completed"))
}

pub async fn delete_report(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<ApiResponse<()>> {
    caller.require_role(&[UserRole::Admin])?;
    if !Report::delete(&state.db, id).await? {
        return Err(AppError::NotFound("report not found".into()));
    }
    tracing::info!(report_id = %id, by = %caller.id, "report deleted");
    Ok(ApiResponse::ok(()).with_message("Report deleted"))
}
