//! Lead score and pipeline metrics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::lead::{Lead, LeadStatus};

const MAX_SCORE: u32 = 100;

/// Value thresholds in smallest currency unit, highest first.
const VALUE_TIERS: [(u64, u32); 3] = [(100_000_00, 30), (50_000_00, 20), (10_000_00, 10)];
const BASE_VALUE_POINTS: u32 = 5;
const CONTACT_FIELD_POINTS: u32 = 10;

fn status_points(status: LeadStatus) -> u32 {
    match status {
        LeadStatus::Solved | LeadStatus::Won => 50,
        LeadStatus::Hot => 40,
        LeadStatus::Warm => 25,
        LeadStatus::Cold => 10,
        LeadStatus::Lost => 0,
    }
}

fn value_points(value: u64) -> u32 {
    VALUE_TIERS
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(BASE_VALUE_POINTS)
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Score in `0..=100`.
pub fn score_lead(lead: &Lead) -> u8 {
    let contact = [&lead.email, &lead.phone, &lead.company]
        .into_iter()
        .filter(|f| filled(f))
        .count() as u32;

    let score = status_points(lead.status) + value_points(lead.value) + contact * CONTACT_FIELD_POINTS;
    score.min(MAX_SCORE) as u8
}

/// Share of live leads that converted, as a percentage. Zero for an empty set.
pub fn conversion_rate(leads: &[Lead]) -> f64 {
    let live: Vec<&Lead> = leads.iter().filter(|l| !l.is_deleted).collect();
    if live.is_empty() {
        return 0.0;
    }
    let converted = live.iter().filter(|l| l.status.is_converted()).count();
    converted as f64 / live.len() as f64 * 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    pub count: usize,
    pub value: u64,
}

/// Per-status counts and value over the live leads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub by_status: BTreeMap<LeadStatus, StatusTotals>,
    pub total_leads: usize,
    pub total_value: u64,
    pub conversion_rate: f64,
}

impl PipelineSummary {
    pub fn totals(&self, status: LeadStatus) -> StatusTotals {
        self.by_status.get(&status).copied().unwrap_or_default()
    }
}

pub fn pipeline_summary(leads: &[Lead]) -> PipelineSummary {
    let mut summary = PipelineSummary::default();
    for lead in leads.iter().filter(|l| !l.is_deleted) {
        let totals = summary.by_status.entry(lead.status).or_default();
        totals.count += 1;
        totals.value = totals.value.saturating_add(lead.value);
        summary.total_leads += 1;
        summary.total_value = summary.total_value.saturating_add(lead.value);
    }
    summary.conversion_rate = conversion_rate(leads);
    summary
}
