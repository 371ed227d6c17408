//! Flow data model
//!
//! Defines the persisted shape of a flow:
//! - [`Flow`] with its owner and timestamps
//! - [`Model`] holding the ordered graph of [`Cell`]s
//! - Operator metadata mirrored from the catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cell type tag of nodes whose metadata is owned by the operator catalog
pub const OPERATOR_CELL_TYPE: &str = "senergy.NodeElement";

/// Store-assigned flow identifier
///
/// Opaque to everything except the store that issued it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    /// Wrap an identifier string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FlowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A stored pipeline definition
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    /// Identifier, absent until the store assigns one
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FlowId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub model: Model,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub share: Share,
    /// Owner, set once from the authenticated creator
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_updated: Option<DateTime<Utc>>,
}

impl Flow {
    /// Create an unsaved flow with a name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With an additional cell appended to the model
    #[must_use]
    pub fn with_cell(mut self, cell: Cell) -> Self {
        self.model.cells.push(cell);
        self
    }

    /// Iterate mutably over operator cells
    pub fn operator_cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.model.cells.iter_mut().filter(|c| c.is_operator())
    }
}

/// Legacy sharing flags, kept for wire compatibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Share {
    pub list: bool,
    pub read: bool,
    pub write: bool,
}

/// Graph of cells
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// A node or edge within a flow graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Cell id, unique within the model
    #[serde(default)]
    pub id: String,
    /// Type tag
    #[serde(rename = "type", default)]
    pub cell_type: String,
    #[serde(default)]
    pub in_ports: Vec<String>,
    #[serde(default)]
    pub out_ports: Vec<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    /// Catalog reference for operator cells
    pub operator_id: Option<String>,
    pub position: Option<CellPosition>,
    pub source: Option<CellLink>,
    pub target: Option<CellLink>,
    pub cost: Option<i64>,
    pub deployment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Vec<CellConfigValue>>,
}

impl Cell {
    /// Create an operator cell referencing a catalog entry
    #[must_use]
    pub fn operator(id: impl Into<String>, operator_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cell_type: OPERATOR_CELL_TYPE.to_string(),
            operator_id: Some(operator_id.into()),
            ..Self::default()
        }
    }

    /// Create a link cell between two port endpoints
    #[must_use]
    pub fn link(id: impl Into<String>, source: CellLink, target: CellLink) -> Self {
        Self {
            id: id.into(),
            cell_type: "link".to_string(),
            source: Some(source),
            target: Some(target),
            ..Self::default()
        }
    }

    /// Whether the catalog is authoritative for this cell's metadata
    #[inline]
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.cell_type == OPERATOR_CELL_TYPE
    }

    /// Overwrite the catalog-owned fields
    pub fn apply_metadata(&mut self, metadata: &OperatorMetadata) {
        self.name = Some(metadata.name.clone());
        self.image = Some(metadata.image.clone());
        self.deployment_type = Some(metadata.deployment_type.clone());
        self.cost = metadata.cost;
    }
}

/// Layout position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CellPosition {
    pub x: f64,
    pub y: f64,
}

/// Edge endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellLink {
    pub id: String,
    #[serde(default)]
    pub magnet: String,
    #[serde(default)]
    pub port: String,
}

/// Named configuration value on a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellConfigValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Catalog entry for an operator
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub deployment_type: String,
    #[serde(default)]
    pub cost: Option<i64>,
}

/// One page of flows with the unpaginated match count
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowsResponse {
    pub flows: Vec<Flow>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flow_wire_format_uses_camel_case() {
        let mut flow = Flow::new("p1").with_cell(Cell::operator("c1", "op1"));
        flow.id = Some(FlowId::new("abc"));
        flow.user_id = "u1".to_string();

        let json = serde_json::to_value(&flow).unwrap();
        assert_eq!(json["_id"], "abc");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["model"]["cells"][0]["type"], OPERATOR_CELL_TYPE);
        assert_eq!(json["model"]["cells"][0]["operatorId"], "op1");
    }

    #[test]
    fn flow_without_id_deserializes() {
        let flow: Flow = serde_json::from_str(r#"{"name":"p1","model":{"cells":[]}}"#).unwrap();
        assert_eq!(flow.id, None);
        assert_eq!(flow.name, "p1");
        assert!(flow.date_created.is_none());
    }

    #[test]
    fn apply_metadata_overwrites_catalog_fields() {
        let mut cell = Cell::operator("c1", "op1");
        cell.name = Some("client name".into());
        cell.cost = Some(99);

        cell.apply_metadata(&OperatorMetadata {
            name: "Filter".into(),
            image: "repo/filter:1".into(),
            deployment_type: "cloud".into(),
            cost: None,
        });

        assert_eq!(cell.name.as_deref(), Some("Filter"));
        assert_eq!(cell.image.as_deref(), Some("repo/filter:1"));
        assert_eq!(cell.deployment_type.as_deref(), Some("cloud"));
        assert_eq!(cell.cost, None);
    }

    #[test]
    fn only_operator_cells_are_iterated() {
        let mut flow = Flow::new("p1")
            .with_cell(Cell::operator("c1", "op1"))
            .with_cell(Cell::link("l1", CellLink::default(), CellLink::default()));

        assert_eq!(flow.operator_cells_mut().count(), 1);
    }
}
