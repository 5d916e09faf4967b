//! Parsed workout statements and the store that resolves them.
//!
//! The parser lives upstream; this crate consumes its output as data. A
//! [`Script`] maps statement ids to [`CodeStatement`]s and carries the root
//! sequence the compiler starts from. Scripts load from JSON, the harness
//! input format.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_fragments::Fragment;

/// Behavior hints attached by the parser. Strategies consult these before
/// falling back to fragment-shape inspection.
pub mod hints {
    pub const TIMER: &str = "behavior.timer";
    pub const REPEATING_INTERVAL: &str = "behavior.repeating_interval";
    pub const AMRAP: &str = "behavior.amrap";
    pub const REST: &str = "behavior.rest";
    pub const WAITING_TO_START: &str = "behavior.waiting_to_start";
    pub const EFFORT: &str = "behavior.effort";
}

/// One parsed statement. `children` holds groups of statement ids; each
/// group is dispatched as a unit by container blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeStatement {
    pub id: u32,
    #[serde(default)]
    pub fragments: Vec<Fragment>,
    #[serde(default)]
    pub hints: BTreeSet<String>,
    #[serde(default)]
    pub children: Vec<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_name: Option<String>,
}

impl CodeStatement {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            fragments: Vec::new(),
            hints: BTreeSet::new(),
            children: Vec::new(),
            exercise_id: None,
            exercise_name: None,
        }
    }

    pub fn has_hint(&self, hint: &str) -> bool {
        self.hints.contains(hint)
    }
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("statement id {id} appears more than once")]
    DuplicateStatement { id: u32 },
    #[error("unknown statement id {id}")]
    UnknownStatement { id: u32 },
    #[error("script parse failure: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serialized script shape: a root id sequence plus a statement list.
#[derive(Debug, Serialize, Deserialize)]
struct ScriptFile {
    #[serde(default)]
    root: Vec<u32>,
    statements: Vec<CodeStatement>,
}

/// Immutable statement store for one run.
#[derive(Debug, Clone, Default)]
pub struct Script {
    statements: BTreeMap<u32, CodeStatement>,
    root: Vec<u32>,
}

impl Script {
    pub fn new(statements: Vec<CodeStatement>, root: Vec<u32>) -> Result<Self, ScriptError> {
        let mut map = BTreeMap::new();
        for statement in statements {
            let id = statement.id;
            if map.insert(id, statement).is_some() {
                return Err(ScriptError::DuplicateStatement { id });
            }
        }
        let script = Self {
            statements: map,
            root,
        };
        // Root ids and child references must resolve up front; a dangling id
        // found mid-run would otherwise surface as a silent skipped child.
        for id in script.root.clone() {
            script.get(id)?;
        }
        for statement in script.statements.values() {
            for group in &statement.children {
                for &id in group {
                    if !script.statements.contains_key(&id) {
                        return Err(ScriptError::UnknownStatement { id });
                    }
                }
            }
        }
        Ok(script)
    }

    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        let file: ScriptFile = serde_json::from_str(text)?;
        Self::new(file.statements, file.root)
    }

    pub fn get(&self, id: u32) -> Result<&CodeStatement, ScriptError> {
        self.statements
            .get(&id)
            .ok_or(ScriptError::UnknownStatement { id })
    }

    /// Root statement sequence the compiler starts from.
    pub fn root(&self) -> &[u32] {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Resolve a group of ids in order.
    pub fn resolve(&self, ids: &[u32]) -> Result<Vec<&CodeStatement>, ScriptError> {
        ids.iter().map(|&id| self.get(id)).collect()
    }
}
