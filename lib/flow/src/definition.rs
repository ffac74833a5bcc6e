//! Flow definitions: step id to block.

use crate::error::FlowError;
use crate::instruction::Instruction;
use chatflow_conversation::{FlowId, StepId};
use serde::Deserialize;
use std::collections::HashMap;

/// The instructions attached to one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Block {
    /// Run in order when a lead enters the step.
    #[serde(default)]
    pub question: Vec<Instruction>,
    /// Run in order when a reply is evaluated at the step.
    #[serde(default)]
    pub answer: Vec<Instruction>,
}

/// A parsed flow: the graph of steps a conversation moves through.
///
/// Definitions are immutable once parsed; reloading a flow replaces the
/// whole definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDefinition {
    blocks: HashMap<StepId, Block>,
}

impl FlowDefinition {
    /// Parses the JSON document of `flow`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyConfig` for blank input and `ConfigParse` unless the
    /// document is an object of blocks whose instruction lists are arrays.
    /// Individual instructions never fail the parse.
    pub fn parse(flow: &FlowId, raw: &str) -> Result<Self, FlowError> {
        if raw.trim().is_empty() {
            return Err(FlowError::EmptyConfig { flow: flow.clone() });
        }
        let blocks = serde_json::from_str::<HashMap<StepId, Block>>(raw).map_err(|e| {
            FlowError::ConfigParse {
                flow: flow.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { blocks })
    }

    /// Builds a definition from already decoded blocks.
    #[must_use]
    pub fn from_blocks(blocks: impl IntoIterator<Item = (StepId, Block)>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
        }
    }

    /// Returns the block for `step`, if the flow defines it.
    #[must_use]
    pub fn block(&self, step: &StepId) -> Option<&Block> {
        self.blocks.get(step)
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the flow defines no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the defined step ids in no particular order.
    pub fn steps(&self) -> impl Iterator<Item = &StepId> {
        self.blocks.keys()
    }
}
