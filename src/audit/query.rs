//! Read access to the audit log
//!
//! Filtered and paginated listing, single-entry lookup and aggregate
//! statistics. Every operation takes the requesting owner and passes it to
//! the store, which scopes by owner before applying any other criteria.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::entry::{AuditAction, AuditEntry, EntityType};
use super::store::{AuditFilter, AuditStore};
use crate::error::{LedgerError, LedgerResult};

/// 1-based page selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self { page, page_size }
    }

    fn validate(&self) -> LedgerResult<()> {
        if self.page == 0 {
            return Err(LedgerError::Query("page must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(LedgerError::Query("limit must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Ordering by timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// One page of entries
#[derive(Debug, Clone, PartialEq)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_count: usize,
}

/// Number of entries recorded on one UTC day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Aggregate counts over an owner's entries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub by_action: BTreeMap<String, usize>,
    pub by_entity_type: BTreeMap<String, usize>,
    /// Days with activity inside the trailing window, oldest first
    pub daily_activity: Vec<DailyCount>,
}

/// Owner-scoped queries over an [`AuditStore`]
#[derive(Clone)]
pub struct AuditQueryService {
    store: Arc<dyn AuditStore>,
    stats_window_days: i64,
}

impl AuditQueryService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            stats_window_days: 30,
        }
    }

    /// Number of trailing days covered by `daily_activity`
    pub fn with_stats_window(mut self, days: i64) -> Self {
        self.stats_window_days = days.max(1);
        self
    }

    /// List entries matching `filter`, one page at a time
    pub async fn list(
        &self,
        owner: &str,
        filter: &AuditFilter,
        page: PageRequest,
        sort: SortOrder,
    ) -> LedgerResult<AuditPage> {
        page.validate()?;
        validate_range(filter)?;

        let mut entries = self.store.find(owner, filter).await?;
        // Stable sort keeps insertion order among equal timestamps
        entries.sort_by_key(|e| e.timestamp);
        if sort == SortOrder::NewestFirst {
            entries.reverse();
        }

        let total_count = entries.len();
        let total_pages = total_count.div_ceil(page.page_size);
        let entries = entries
            .into_iter()
            .skip((page.page - 1).saturating_mul(page.page_size))
            .take(page.page_size)
            .collect();

        Ok(AuditPage {
            entries,
            current_page: page.page,
            total_pages,
            total_count,
        })
    }

    /// A single entry, only if `owner` recorded it
    pub async fn get_by_id(&self, owner: &str, id: Uuid) -> LedgerResult<Option<AuditEntry>> {
        self.store.find_by_id(owner, id).await
    }

    /// Counts over the owner's entries in an optional inclusive time range
    pub async fn stats(
        &self,
        owner: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<AuditStats> {
        self.stats_at(owner, from, to, Utc::now()).await
    }

    /// [`stats`](Self::stats) with an explicit notion of "now"
    pub async fn stats_at(
        &self,
        owner: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> LedgerResult<AuditStats> {
        let filter = AuditFilter::between(from, to);
        validate_range(&filter)?;

        let entries = self.store.find(owner, &filter).await?;

        let mut by_action: BTreeMap<String, usize> = AuditAction::ALL
            .iter()
            .map(|a| (a.as_str().to_string(), 0))
            .collect();
        let mut by_entity_type: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &entries {
            *by_action.entry(entry.action.as_str().to_string()).or_default() += 1;
            *by_entity_type
                .entry(entry.entity_type.as_str().to_string())
                .or_default() += 1;
        }

        let window_end = to.map_or(now, |to| to.min(now));
        let window_start = window_start(window_end, self.stats_window_days);
        let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for entry in entries
            .iter()
            .filter(|e| e.timestamp >= window_start && e.timestamp <= window_end)
        {
            *daily.entry(entry.timestamp.date_naive()).or_default() += 1;
        }

        Ok(AuditStats {
            total: entries.len(),
            by_action,
            by_entity_type,
            daily_activity: daily
                .into_iter()
                .map(|(date, count)| DailyCount { date, count })
                .collect(),
        })
    }

    /// Entity types that have at least one entry for `owner`
    pub async fn entity_types_in_use(&self, owner: &str) -> LedgerResult<Vec<EntityType>> {
        let stats = self.stats(owner, None, None).await?;
        Ok(EntityType::ALL
            .into_iter()
            .filter(|t| stats.by_entity_type.contains_key(t.as_str()))
            .collect())
    }
}

/// Midnight UTC at the start of the first day of a `days`-long window ending at `end`
///
/// Windows reaching past the earliest representable date start there.
fn window_start(end: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    let first_day = Duration::try_days(days.max(1) - 1)
        .and_then(|span| end.date_naive().checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN);
    first_day.and_hms_opt(0, 0, 0).map_or(end, |dt| dt.and_utc())
}

fn validate_range(filter: &AuditFilter) -> LedgerResult<()> {
    match (filter.from, filter.to) {
        (Some(from), Some(to)) if from > to => Err(LedgerError::Query(
            "startDate must not be after endDate".into(),
        )),
        _ => Ok(()),
    }
}
