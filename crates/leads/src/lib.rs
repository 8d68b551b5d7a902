//! Leads domain module.
//!
//! The lead record and its change commands (with enforced optimistic
//! concurrency), list filtering/sorting/pagination, scoring and pipeline
//! metrics, and geofence-based territory assignment. No IO.

pub mod assignment;
pub mod filter;
pub mod lead;
pub mod scoring;

pub use assignment::{assign_territory, best_territory_for_lead};
pub use filter::{
    apply, paginate, AssigneeFilter, CreatedWithin, LeadFilters, LeadQuery, LeadTable, Page,
    SortDirection, SortKey, DEFAULT_PAGE_SIZE,
};
pub use lead::{
    ChangeLeadStatus, CreateLead, DeleteLead, Lead, LeadCommand, LeadDetails, LeadEvent,
    LeadStatus, ReassignLead, UpdateLeadDetails,
};
pub use scoring::{conversion_rate, pipeline_summary, score_lead, PipelineSummary, StatusTotals};
