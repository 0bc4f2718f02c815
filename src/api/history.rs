//! History read endpoints
//!
//! Translates raw query-string parameters into [`AuditQueryService`] calls
//! and renders the JSON bodies clients consume. The requesting owner always
//! comes from the authenticated session, never from the parameters.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use super::ApiResponse;
use crate::audit::{
    field_changes, summarize, AuditAction, AuditFilter, AuditQueryService, EntityType,
    PageRequest, SortOrder,
};
use crate::config::settings::QuerySettings;
use crate::error::{LedgerError, LedgerResult};

/// Query-string parameters, already percent-decoded
pub type Params = HashMap<String, String>;

/// Owner-scoped history endpoints
#[derive(Clone)]
pub struct HistoryApi {
    service: AuditQueryService,
    default_page_size: usize,
    max_page_size: usize,
}

impl HistoryApi {
    pub fn new(service: AuditQueryService, settings: &QuerySettings) -> Self {
        Self {
            service,
            default_page_size: settings.default_page_size,
            max_page_size: settings.max_page_size,
        }
    }

    /// `GET /audit-logs`
    pub async fn list(&self, owner: &str, params: &Params) -> ApiResponse {
        if owner.is_empty() {
            return ApiResponse::unauthorized();
        }

        let (filter, page) = match self.list_request(params) {
            Ok(request) => request,
            Err(e) => return error_response(e),
        };

        match self.service.list(owner, &filter, page, SortOrder::NewestFirst).await {
            Ok(result) => ApiResponse::ok(json!({
                "logs": result.entries,
                "pagination": {
                    "currentPage": result.current_page,
                    "totalPages": result.total_pages,
                    "totalCount": result.total_count,
                    "limit": page.page_size,
                },
            })),
            Err(e) => error_response(e),
        }
    }

    /// `GET /audit-logs/stats`
    pub async fn stats(&self, owner: &str, params: &Params) -> ApiResponse {
        if owner.is_empty() {
            return ApiResponse::unauthorized();
        }

        let (from, to) = match date_range(params) {
            Ok(range) => range,
            Err(e) => return error_response(e),
        };

        match self.service.stats(owner, from, to).await {
            Ok(stats) => ApiResponse::ok(json!(stats)),
            Err(e) => error_response(e),
        }
    }

    /// `GET /audit-logs/{id}`
    pub async fn get(&self, owner: &str, id: &str) -> ApiResponse {
        if owner.is_empty() {
            return ApiResponse::unauthorized();
        }

        // A malformed id cannot name any entry, so it reads the same as an unknown one
        let Ok(uuid) = Uuid::parse_str(id.trim()) else {
            debug!(id, "Malformed audit entry id");
            return error_response(LedgerError::audit_entry_not_found(id));
        };

        match self.service.get_by_id(owner, uuid).await {
            Ok(Some(entry)) => {
                let changes = match (
                    entry.action,
                    entry.changes.old.as_ref(),
                    entry.changes.new.as_ref(),
                ) {
                    (AuditAction::Update, Some(old), Some(new)) => field_changes(old, new),
                    _ => Vec::new(),
                };
                let summary = summarize(&changes);

                ApiResponse::ok(json!({
                    "entry": entry,
                    "changes": changes,
                    "summary": summary,
                }))
            }
            Ok(None) => error_response(LedgerError::audit_entry_not_found(id)),
            Err(e) => error_response(e),
        }
    }

    fn list_request(&self, params: &Params) -> LedgerResult<(AuditFilter, PageRequest)> {
        let page = parse_number(params, "page")?.unwrap_or(1);
        let limit = parse_number(params, "limit")?
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size);

        let filter = AuditFilter {
            entity_type: param(params, "entityType")
                .map(|v| {
                    v.parse::<EntityType>()
                        .map_err(|_| LedgerError::Query(format!("unknown entityType '{}'", v)))
                })
                .transpose()?,
            action: param(params, "action")
                .map(|v| {
                    v.parse::<AuditAction>()
                        .map_err(|_| LedgerError::Query(format!("unknown action '{}'", v)))
                })
                .transpose()?,
            entity_id: param(params, "entityId").map(str::to_string),
            search: param(params, "search").map(str::to_string),
            ..AuditFilter::default()
        };
        let (from, to) = date_range(params)?;

        Ok((AuditFilter { from, to, ..filter }, PageRequest::new(page, limit)))
    }
}

/// Which end of a day a bare `YYYY-MM-DD` stands for
#[derive(Clone, Copy)]
enum DateBound {
    Start,
    End,
}

/// A parameter's trimmed value; empty counts as absent
fn param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_number(params: &Params, name: &str) -> LedgerResult<Option<usize>> {
    param(params, name)
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| LedgerError::Query(format!("{} must be a positive integer", name)))
        })
        .transpose()
}

fn parse_date(params: &Params, name: &str, bound: DateBound) -> LedgerResult<Option<DateTime<Utc>>> {
    let Some(value) = param(params, name) else {
        return Ok(None);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        LedgerError::Query(format!(
            "{} must be an RFC 3339 timestamp or YYYY-MM-DD date",
            name
        ))
    })?;
    let local = match bound {
        DateBound::Start => date.and_hms_opt(0, 0, 0),
        DateBound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
    }
    .ok_or_else(|| LedgerError::Query(format!("{} is out of range", name)))?;
    Ok(Some(local.and_utc()))
}

fn date_range(params: &Params) -> LedgerResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    Ok((
        parse_date(params, "startDate", DateBound::Start)?,
        parse_date(params, "endDate", DateBound::End)?,
    ))
}

fn error_response(err: LedgerError) -> ApiResponse {
    if err.is_client_error() {
        debug!(error = %err, "Rejected history request");
        ApiResponse::error(400, err.to_string())
    } else if err.is_not_found() {
        ApiResponse::error(404, err.to_string())
    } else {
        error!(error = %err, "History query failed");
        ApiResponse::error(500, "Failed to read audit history")
    }
}
