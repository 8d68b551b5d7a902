//! Search, filtering, sorting and pagination for lead lists.
//!
//! This runs over rows the caller is already allowed to see. Narrowing by
//! territory here is a presentation concern only; visibility is enforced by
//! the authorization layer and the storage backend's scoped queries.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use kaos_core::{TerritoryId, UserId};

use crate::lead::{Lead, LeadStatus};

pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "user_id")]
pub enum AssigneeFilter {
    Unassigned,
    User(UserId),
}

/// Relative lower bound on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatedWithin {
    Today,
    Last7Days,
    Last30Days,
    Last90Days,
}

impl CreatedWithin {
    pub fn lower_bound(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            CreatedWithin::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc())
                .unwrap_or(now),
            CreatedWithin::Last7Days => now - Duration::days(7),
            CreatedWithin::Last30Days => now - Duration::days(30),
            CreatedWithin::Last90Days => now - Duration::days(90),
        }
    }
}

/// Each filter is optional; an absent filter passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadFilters {
    pub status: Option<LeadStatus>,
    pub assignee: Option<AssigneeFilter>,
    pub territory_id: Option<TerritoryId>,
    pub min_value: Option<u64>,
    pub max_value: Option<u64>,
    pub created_within: Option<CreatedWithin>,
}

impl LeadFilters {
    fn matches(&self, lead: &Lead, now: DateTime<Utc>) -> bool {
        if self.status.is_some_and(|s| lead.status != s) {
            return false;
        }
        match self.assignee {
            Some(AssigneeFilter::Unassigned) if lead.assigned_user_id.is_some() => return false,
            Some(AssigneeFilter::User(id)) if lead.assigned_user_id != Some(id) => return false,
            _ => {}
        }
        if self.territory_id.is_some() && lead.territory_id != self.territory_id {
            return false;
        }
        if self.min_value.is_some_and(|min| lead.value < min) {
            return false;
        }
        if self.max_value.is_some_and(|max| lead.value > max) {
            return false;
        }
        if let Some(window) = self.created_within {
            if lead.created_at < window.lower_bound(now) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Company,
    Status,
    Value,
    Score,
    #[default]
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

impl SortKey {
    fn compare(self, a: &Lead, b: &Lead) -> Ordering {
        match self {
            SortKey::Name => compare_text(&a.name, &b.name),
            SortKey::Company => compare_text(
                a.company.as_deref().unwrap_or(""),
                b.company.as_deref().unwrap_or(""),
            ),
            SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
            SortKey::Value => a.value.cmp(&b.value),
            SortKey::Score => a.score.cmp(&b.score),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

/// Search text, filters and sort order for a lead list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadQuery {
    pub search: String,
    pub filters: LeadFilters,
    pub sort_key: SortKey,
    pub direction: SortDirection,
}

fn matches_search(lead: &Lead, needle: &str) -> bool {
    [
        Some(lead.name.as_str()),
        lead.company.as_deref(),
        lead.email.as_deref(),
        lead.phone.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Filter then sort. Soft-deleted leads never appear.
///
/// The sort is stable: leads that compare equal keep their input order.
pub fn apply(leads: &[Lead], query: &LeadQuery, now: DateTime<Utc>) -> Vec<Lead> {
    let needle = query.search.trim().to_lowercase();

    let mut out: Vec<Lead> = leads
        .iter()
        .filter(|l| !l.is_deleted)
        .filter(|l| needle.is_empty() || matches_search(l, &needle))
        .filter(|l| query.filters.matches(l, now))
        .cloned()
        .collect();

    let key = query.sort_key;
    match query.direction {
        SortDirection::Asc => out.sort_by(|a, b| key.compare(a, b)),
        SortDirection::Desc => out.sort_by(|a, b| key.compare(b, a)),
    }
    out
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Slice out a 1-based page. Out-of-range pages are clamped.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total_items);

    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page,
        page_size,
        total_items,
        total_pages,
    }
}

/// View state of the lead table.
///
/// Changing the search, filters or sort jumps back to page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadTable {
    query: LeadQuery,
    page: usize,
    page_size: usize,
}

impl Default for LeadTable {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl LeadTable {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: LeadQuery::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn query(&self) -> &LeadQuery {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.query.search = search.into();
        self.page = 1;
    }

    pub fn set_filters(&mut self, filters: LeadFilters) {
        self.query.filters = filters;
        self.page = 1;
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.query.sort_key = key;
        self.query.direction = direction;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn view(&self, leads: &[Lead], now: DateTime<Utc>) -> Page<Lead> {
        paginate(&apply(leads, &self.query, now), self.page, self.page_size)
    }
}
