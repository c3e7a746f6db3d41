//! Owning Tree Metadata
//!
//! A structure tree is owned by either a reusable template or a versioned
//! instance cloned from a template. [`OwnerId`] identifies the owning tree
//! and is the key every node carries; the two owner kinds keep their node
//! sets disjoint even though nodes share one schema.

use crate::models::node::{Status, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted template identifier, assigned by the template store on save.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TemplateId(pub i64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted instance identifier, assigned by the instance store on save.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct InstanceId(pub i64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a car series (catalog entity, managed elsewhere).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SeriesId(pub i64);

/// Reference to a car model (catalog entity, managed elsewhere).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ModelId(pub i64);

/// Which flavor of tree an owner is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeKind {
    Template,
    Instance,
}

impl TreeKind {
    /// Template trees have exactly one root; instance trees may have several
    /// independent roots. The asymmetry is a documented rule, not an
    /// accident.
    pub fn allows_multiple_roots(self) -> bool {
        matches!(self, TreeKind::Instance)
    }
}

/// Identity of the tree a node belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum OwnerId {
    Template(TemplateId),
    Instance(InstanceId),
}

impl OwnerId {
    pub fn kind(&self) -> TreeKind {
        match self {
            OwnerId::Template(_) => TreeKind::Template,
            OwnerId::Instance(_) => TreeKind::Instance,
        }
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerId::Template(id) => write!(f, "template:{id}"),
            OwnerId::Instance(id) => write!(f, "instance:{id}"),
        }
    }
}

fn require_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// A reusable structure-tree template.
///
/// `code` plus `version` is the business identity; several versions of one
/// code coexist, each owning an independent node set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureTemplate {
    pub id: Option<TemplateId>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub status: Status,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StructureTemplate {
    pub fn create(
        code: String,
        name: String,
        description: Option<String>,
        version: String,
        creator: String,
    ) -> Result<Self, ValidationError> {
        require_text(&code, "code")?;
        require_text(&name, "name")?;
        require_text(&version, "version")?;
        require_text(&creator, "creator")?;
        let now = Utc::now();

        Ok(Self {
            id: None,
            code,
            name,
            description,
            version,
            status: Status::Enabled,
            creator,
            created_at: now,
            updated_at: now,
        })
    }

    /// The tree this template owns. `None` until the template is saved.
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.id.map(OwnerId::Template)
    }

    pub fn update_info(
        &mut self,
        name: String,
        description: Option<String>,
    ) -> Result<(), ValidationError> {
        require_text(&name, "name")?;
        self.name = name;
        self.description = description;
        self.touch();
        Ok(())
    }

    pub fn transition_status(&mut self, to: Status) -> Result<(), ValidationError> {
        if !self.status.can_transition(to) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A versioned structure-tree instance for a concrete series/model.
///
/// Created by cloning a template's node set (or a prior instance version);
/// afterwards the instance evolves independently of its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureInstance {
    pub id: Option<InstanceId>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub series_id: Option<SeriesId>,
    pub model_id: Option<ModelId>,
    pub version: String,
    pub status: Status,
    pub published: bool,
    pub effective_time: Option<DateTime<Utc>>,
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StructureInstance {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        code: String,
        name: String,
        description: Option<String>,
        series_id: Option<SeriesId>,
        model_id: Option<ModelId>,
        version: String,
        creator: String,
    ) -> Result<Self, ValidationError> {
        require_text(&code, "code")?;
        require_text(&name, "name")?;
        require_text(&version, "version")?;
        require_text(&creator, "creator")?;
        let now = Utc::now();

        Ok(Self {
            id: None,
            code,
            name,
            description,
            series_id,
            model_id,
            version,
            status: Status::Enabled,
            published: false,
            effective_time: None,
            creator,
            created_at: now,
            updated_at: now,
        })
    }

    /// The tree this instance owns. `None` until the instance is saved.
    pub fn owner_id(&self) -> Option<OwnerId> {
        self.id.map(OwnerId::Instance)
    }

    /// Mark the instance as published from `effective_time` on.
    pub fn publish(&mut self, effective_time: DateTime<Utc>) {
        self.published = true;
        self.effective_time = Some(effective_time);
        self.touch();
    }

    /// Withdraw a published instance.
    pub fn unpublish(&mut self) {
        self.published = false;
        self.effective_time = None;
        self.touch();
    }

    pub fn transition_status(&mut self, to: Status) -> Result<(), ValidationError> {
        if !self.status.can_transition(to) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.touch();
        Ok(())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
