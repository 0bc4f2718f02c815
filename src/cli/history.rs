//! History CLI commands
//!
//! Reads the audit log under the data directory through the same
//! [`HistoryApi`] a server would expose and prints the response bodies.

use std::sync::Arc;

use clap::Subcommand;
use serde_json::Value;

use crate::api::{ApiResponse, HistoryApi, Params};
use crate::audit::{AuditQueryService, JsonlAuditStore};
use crate::config::{LedgerPaths, Settings};
use crate::error::{LedgerError, LedgerResult};

/// History subcommands
#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List recorded changes, newest first
    List {
        /// Tenant whose history to read
        #[arg(long, env = "LEDGERBOOK_OWNER")]
        owner: String,
        /// Page number (1-based)
        #[arg(long)]
        page: Option<usize>,
        /// Entries per page
        #[arg(long)]
        limit: Option<usize>,
        /// Record type tag (e.g. expense, customer-payment)
        #[arg(long)]
        entity_type: Option<String>,
        /// CREATE, UPDATE or DELETE
        #[arg(long)]
        action: Option<String>,
        /// Record identifier
        #[arg(long)]
        entity_id: Option<String>,
        /// Text to look for in entry descriptions
        #[arg(short, long)]
        search: Option<String>,
        /// Earliest timestamp (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
        /// Latest timestamp (RFC 3339 or YYYY-MM-DD, whole day)
        #[arg(long)]
        end_date: Option<String>,
    },

    /// Show one entry with its field-level changes
    Show {
        /// Audit entry ID
        id: String,
        #[arg(long, env = "LEDGERBOOK_OWNER")]
        owner: String,
    },

    /// Aggregate counts by action, record type and day
    Stats {
        #[arg(long, env = "LEDGERBOOK_OWNER")]
        owner: String,
        #[arg(long)]
        start_date: Option<String>,
        #[arg(long)]
        end_date: Option<String>,
    },

    /// Record types that have history
    Types {
        #[arg(long, env = "LEDGERBOOK_OWNER")]
        owner: String,
    },
}

/// Handle a history command
pub async fn handle_history_command(
    paths: &LedgerPaths,
    settings: &Settings,
    cmd: HistoryCommands,
) -> LedgerResult<()> {
    let store = Arc::new(JsonlAuditStore::new(paths.audit_log()));
    let service =
        AuditQueryService::new(store).with_stats_window(settings.query.stats_window_days);
    let api = HistoryApi::new(service.clone(), &settings.query);

    let body = match cmd {
        HistoryCommands::List {
            owner,
            page,
            limit,
            entity_type,
            action,
            entity_id,
            search,
            start_date,
            end_date,
        } => {
            let mut params = Params::new();
            insert(&mut params, "page", page.map(|p| p.to_string()));
            insert(&mut params, "limit", limit.map(|l| l.to_string()));
            insert(&mut params, "entityType", entity_type);
            insert(&mut params, "action", action);
            insert(&mut params, "entityId", entity_id);
            insert(&mut params, "search", search);
            insert(&mut params, "startDate", start_date);
            insert(&mut params, "endDate", end_date);

            into_result(api.list(&owner, &params).await)?
        }

        HistoryCommands::Show { id, owner } => into_result(api.get(&owner, &id).await)?,

        HistoryCommands::Stats {
            owner,
            start_date,
            end_date,
        } => {
            let mut params = Params::new();
            insert(&mut params, "startDate", start_date);
            insert(&mut params, "endDate", end_date);

            into_result(api.stats(&owner, &params).await)?
        }

        HistoryCommands::Types { owner } => {
            let types = service.entity_types_in_use(&owner).await?;
            Value::from(
                types
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect::<Vec<_>>(),
            )
        }
    };

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn insert(params: &mut Params, name: &str, value: Option<String>) {
    if let Some(value) = value {
        params.insert(name.to_string(), value);
    }
}

/// Turn a non-2xx response back into the matching error
fn into_result(response: ApiResponse) -> LedgerResult<Value> {
    if response.is_success() {
        return Ok(response.body);
    }

    let message = response.body["error"].as_str().unwrap_or("request failed");
    // Bodies carry the rendered error; keep only the detail after its prefix
    let detail = message.split_once(": ").map_or(message, |(_, detail)| detail);

    Err(match response.status {
        404 => LedgerError::audit_entry_not_found(detail),
        400 => LedgerError::Query(detail.to_string()),
        401 => LedgerError::Validation(detail.to_string()),
        _ => LedgerError::Storage(detail.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_result_maps_statuses() {
        let ok = into_result(ApiResponse::ok(json!({"total": 0}))).unwrap();
        assert_eq!(ok["total"], 0);

        let err =
            into_result(ApiResponse::error(404, "Audit entry not found: abc")).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Audit entry not found: abc");

        let err = into_result(ApiResponse::error(400, "Query error: page must be at least 1"))
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Query error: page must be at least 1");
    }
}
