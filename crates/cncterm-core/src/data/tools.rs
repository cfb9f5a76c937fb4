//! Tool table
//!
//! Static catalog of the tools mounted on the machine.

use serde::{Deserialize, Serialize};

/// A single tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Tool number (T word)
    pub id: u32,
    /// Cutter diameter in mm
    pub diameter: f64,
    /// Gauge length in mm
    pub length: f64,
    /// Human readable description
    pub description: String,
}

impl ToolEntry {
    /// Create a new tool entry
    pub fn new(id: u32, diameter: f64, length: f64, description: impl Into<String>) -> Self {
        Self {
            id,
            diameter,
            length,
            description: description.into(),
        }
    }
}

/// Ordered collection of tools
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolTable {
    tools: Vec<ToolEntry>,
}

impl ToolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The tools every machine starts with
    pub fn standard() -> Self {
        Self {
            tools: vec![
                ToolEntry::new(1, 6.0, 50.0, "End Mill 6mm"),
                ToolEntry::new(2, 3.175, 40.0, "Ball Nose 1/8"),
                ToolEntry::new(99, 10.0, 0.0, "Probe"),
            ],
        }
    }

    /// Add or replace a tool, keeping the table ordered by id
    pub fn insert(&mut self, tool: ToolEntry) {
        match self.tools.binary_search_by_key(&tool.id, |t| t.id) {
            Ok(idx) => self.tools[idx] = tool,
            Err(idx) => self.tools.insert(idx, tool),
        }
    }

    /// Look up a tool by number
    pub fn get(&self, id: u32) -> Option<&ToolEntry> {
        self.tools.iter().find(|t| t.id == id)
    }

    /// Iterate tools in id order
    pub fn iter(&self) -> impl Iterator<Item = &ToolEntry> {
        self.tools.iter()
    }

    /// Number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
