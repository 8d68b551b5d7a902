use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kaos_core::{
    Aggregate, AggregateRoot, DomainError, ExpectedVersion, LeadId, OrganizationId, TerritoryId,
    TerritoryScoped, UserId,
};
use kaos_territories::GeoPoint;

use crate::scoring::score_lead;

/// Pipeline stage of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Hot,
    Warm,
    Cold,
    Solved,
    Won,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 6] = [
        LeadStatus::Hot,
        LeadStatus::Warm,
        LeadStatus::Cold,
        LeadStatus::Solved,
        LeadStatus::Won,
        LeadStatus::Lost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeadStatus::Hot => "hot",
            LeadStatus::Warm => "warm",
            LeadStatus::Cold => "cold",
            LeadStatus::Solved => "solved",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }

    /// Solved and won both count as a conversion.
    pub fn is_converted(self) -> bool {
        matches!(self, LeadStatus::Solved | LeadStatus::Won)
    }
}

impl core::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for LeadStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| DomainError::validation(format!("unknown lead status: {s}")))
    }
}

/// A prospective customer record.
///
/// Rows are never physically removed: deletion sets `is_deleted` and every
/// listing skips the record from then on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: LeadStatus,
    /// Value in smallest currency unit (e.g., cents).
    pub value: u64,
    /// 0-100, derived from status, value and contact completeness.
    pub score: u8,
    #[serde(default)]
    pub assigned_user_id: Option<UserId>,
    #[serde(default)]
    pub territory_id: Option<TerritoryId>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    pub version: u64,
}

impl Lead {
    /// A not-yet-created record, ready to receive a `Create` command.
    pub fn empty(id: LeadId) -> Self {
        Self {
            id,
            organization_id: None,
            name: String::new(),
            company: None,
            email: None,
            phone: None,
            status: LeadStatus::Cold,
            value: 0,
            score: 0,
            assigned_user_id: None,
            territory_id: None,
            location: None,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            is_deleted: false,
            version: 0,
        }
    }

    pub fn exists(&self) -> bool {
        self.version > 0
    }

    /// Decide and apply a command in one step.
    pub fn execute(&mut self, command: &LeadCommand) -> Result<Vec<LeadEvent>, DomainError> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }

    fn details(&self) -> LeadDetails {
        LeadDetails {
            name: self.name.clone(),
            company: self.company.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            value: self.value,
            location: self.location,
        }
    }

    fn set_details(&mut self, details: &LeadDetails) {
        self.name = details.name.clone();
        self.company = details.company.clone();
        self.email = details.email.clone();
        self.phone = details.phone.clone();
        self.value = details.value;
        self.location = details.location;
    }
}

impl AggregateRoot for Lead {
    type Id = LeadId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl TerritoryScoped for Lead {
    fn territory_id(&self) -> Option<TerritoryId> {
        self.territory_id
    }
}

/// Editable descriptive fields of a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadDetails {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub value: u64,
    pub location: Option<GeoPoint>,
}

impl LeadDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            company: None,
            email: None,
            phone: None,
            value: 0,
            location: None,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("lead name cannot be empty"));
        }
        if let Some(email) = self.email.as_deref() {
            if !email.is_empty() && !email.contains('@') {
                return Err(DomainError::validation(format!("invalid email: {email}")));
            }
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        Ok(())
    }
}

/// Command: CreateLead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLead {
    pub lead_id: LeadId,
    pub organization_id: Option<OrganizationId>,
    pub details: LeadDetails,
    pub status: LeadStatus,
    pub assigned_user_id: Option<UserId>,
    pub territory_id: Option<TerritoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateLeadDetails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateLeadDetails {
    pub lead_id: LeadId,
    pub expected_version: u64,
    pub details: LeadDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeLeadStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLeadStatus {
    pub lead_id: LeadId,
    pub expected_version: u64,
    pub status: LeadStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReassignLead. `None` clears the assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignLead {
    pub lead_id: LeadId,
    pub expected_version: u64,
    pub assigned_user_id: Option<UserId>,
    pub territory_id: Option<TerritoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteLead (soft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteLead {
    pub lead_id: LeadId,
    pub expected_version: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeadCommand {
    Create(CreateLead),
    UpdateDetails(UpdateLeadDetails),
    ChangeStatus(ChangeLeadStatus),
    Reassign(ReassignLead),
    SoftDelete(DeleteLead),
}

impl LeadCommand {
    pub fn lead_id(&self) -> LeadId {
        match self {
            LeadCommand::Create(c) => c.lead_id,
            LeadCommand::UpdateDetails(c) => c.lead_id,
            LeadCommand::ChangeStatus(c) => c.lead_id,
            LeadCommand::Reassign(c) => c.lead_id,
            LeadCommand::SoftDelete(c) => c.lead_id,
        }
    }

    /// Version the command was written against. Creation expects a fresh record.
    pub fn expected_version(&self) -> ExpectedVersion {
        match self {
            LeadCommand::Create(_) => ExpectedVersion::Exact(0),
            LeadCommand::UpdateDetails(c) => ExpectedVersion::Exact(c.expected_version),
            LeadCommand::ChangeStatus(c) => ExpectedVersion::Exact(c.expected_version),
            LeadCommand::Reassign(c) => ExpectedVersion::Exact(c.expected_version),
            LeadCommand::SoftDelete(c) => ExpectedVersion::Exact(c.expected_version),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeadEvent {
    Created(CreateLead),
    DetailsUpdated {
        details: LeadDetails,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged {
        from: LeadStatus,
        to: LeadStatus,
        occurred_at: DateTime<Utc>,
    },
    Reassigned {
        assigned_user_id: Option<UserId>,
        territory_id: Option<TerritoryId>,
        occurred_at: DateTime<Utc>,
    },
    Deleted {
        occurred_at: DateTime<Utc>,
    },
}

impl LeadEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            LeadEvent::Created(_) => "lead.created",
            LeadEvent::DetailsUpdated { .. } => "lead.details_updated",
            LeadEvent::StatusChanged { .. } => "lead.status_changed",
            LeadEvent::Reassigned { .. } => "lead.reassigned",
            LeadEvent::Deleted { .. } => "lead.deleted",
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LeadEvent::Created(e) => e.occurred_at,
            LeadEvent::DetailsUpdated { occurred_at, .. }
            | LeadEvent::StatusChanged { occurred_at, .. }
            | LeadEvent::Reassigned { occurred_at, .. }
            | LeadEvent::Deleted { occurred_at } => *occurred_at,
        }
    }
}

impl Aggregate for Lead {
    type Command = LeadCommand;
    type Event = LeadEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LeadEvent::Created(e) => {
                self.id = e.lead_id;
                self.organization_id = e.organization_id;
                self.set_details(&e.details);
                self.status = e.status;
                self.assigned_user_id = e.assigned_user_id;
                self.territory_id = e.territory_id;
                self.created_at = e.occurred_at;
                self.is_deleted = false;
            }
            LeadEvent::DetailsUpdated { details, .. } => self.set_details(details),
            LeadEvent::StatusChanged { to, .. } => self.status = *to,
            LeadEvent::Reassigned {
                assigned_user_id,
                territory_id,
                ..
            } => {
                self.assigned_user_id = *assigned_user_id;
                self.territory_id = *territory_id;
            }
            LeadEvent::Deleted { .. } => self.is_deleted = true,
        }

        self.updated_at = event.occurred_at();
        self.score = score_lead(self);
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.lead_id() != self.id {
            return Err(DomainError::invariant("lead_id mismatch"));
        }
        match command {
            LeadCommand::Create(cmd) => self.handle_create(cmd),
            LeadCommand::UpdateDetails(cmd) => {
                self.ensure_current(cmd.expected_version)?;
                cmd.details.validate()?;
                if cmd.details == self.details() {
                    return Ok(Vec::new());
                }
                Ok(vec![LeadEvent::DetailsUpdated {
                    details: cmd.details.clone(),
                    occurred_at: cmd.occurred_at,
                }])
            }
            LeadCommand::ChangeStatus(cmd) => {
                self.ensure_current(cmd.expected_version)?;
                if cmd.status == self.status {
                    return Ok(Vec::new());
                }
                Ok(vec![LeadEvent::StatusChanged {
                    from: self.status,
                    to: cmd.status,
                    occurred_at: cmd.occurred_at,
                }])
            }
            LeadCommand::Reassign(cmd) => {
                self.ensure_current(cmd.expected_version)?;
                if cmd.assigned_user_id == self.assigned_user_id
                    && cmd.territory_id == self.territory_id
                {
                    return Ok(Vec::new());
                }
                Ok(vec![LeadEvent::Reassigned {
                    assigned_user_id: cmd.assigned_user_id,
                    territory_id: cmd.territory_id,
                    occurred_at: cmd.occurred_at,
                }])
            }
            LeadCommand::SoftDelete(cmd) => {
                self.ensure_current(cmd.expected_version)?;
                Ok(vec![LeadEvent::Deleted {
                    occurred_at: cmd.occurred_at,
                }])
            }
        }
    }
}

impl Lead {
    fn handle_create(&self, cmd: &CreateLead) -> Result<Vec<LeadEvent>, DomainError> {
        if self.exists() {
            return Err(DomainError::invariant("lead already exists"));
        }
        cmd.details.validate()?;
        Ok(vec![LeadEvent::Created(cmd.clone())])
    }

    /// Deleted records behave as missing; live ones must match the writer's version.
    fn ensure_current(&self, expected_version: u64) -> Result<(), DomainError> {
        if !self.exists() || self.is_deleted {
            return Err(DomainError::not_found());
        }
        ExpectedVersion::Exact(expected_version).check(self.version)
    }
}
