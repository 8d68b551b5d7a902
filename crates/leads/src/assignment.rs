//! Territory assignment from a lead's coordinate.

use chrono::{DateTime, Utc};
use tracing::debug;

use kaos_territories::{best_territory_for_point, Territory};

use crate::lead::{Lead, LeadCommand, ReassignLead};

/// The territory whose boundary holds the lead's location.
///
/// Leads without a location have no implicit territory.
pub fn best_territory_for_lead<'a>(lead: &Lead, territories: &'a [Territory]) -> Option<&'a Territory> {
    let location = lead.location?;
    best_territory_for_point(location, territories)
}

/// Build a reassignment that moves the lead into its geofenced territory.
///
/// Returns `None` when the lead is already there or no territory contains it.
/// The current assignee is kept.
pub fn assign_territory(
    lead: &Lead,
    territories: &[Territory],
    occurred_at: DateTime<Utc>,
) -> Option<LeadCommand> {
    let territory = best_territory_for_lead(lead, territories)?;
    if lead.territory_id == Some(territory.id) {
        return None;
    }

    debug!(lead_id = %lead.id, territory_id = %territory.id, territory = %territory.name, "geofence matched lead");
    Some(LeadCommand::Reassign(ReassignLead {
        lead_id: lead.id,
        expected_version: lead.version,
        assigned_user_id: lead.assigned_user_id,
        territory_id: Some(territory.id),
        occurred_at,
    }))
}
