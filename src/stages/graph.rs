//! Stage identifiers and the dependency graph that orders them.

use crate::error::{Result, StageError};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The release stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    /// Version format, blockers, existing release, working state
    Validate,
    /// Dependent repository's sync automation
    WaitUpstream,
    /// Prepare-release automation and its pull request
    Prepare,
    /// Tag publication, release branch and tag builds
    PushTags,
    /// Post-release checklist
    Verify,
}

impl StageId {
    /// Every stage, in declaration order
    pub const ALL: [StageId; 5] = [
        StageId::Validate,
        StageId::WaitUpstream,
        StageId::Prepare,
        StageId::PushTags,
        StageId::Verify,
    ];

    /// Command-line and persisted name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::WaitUpstream => "wait-upstream",
            Self::Prepare => "prepare",
            Self::PushTags => "push-tags",
            Self::Verify => "verify",
        }
    }

    /// Stages that must have succeeded before this one runs
    pub fn predecessors(&self) -> &'static [StageId] {
        match self {
            Self::Validate => &[],
            Self::WaitUpstream => &[StageId::Validate],
            Self::Prepare => &[StageId::WaitUpstream],
            Self::PushTags => &[StageId::Prepare],
            Self::Verify => &[StageId::PushTags],
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Directed acyclic graph of stages
///
/// Edges point from a predecessor to the stage that depends on it, so a
/// topological sort yields execution order.
#[derive(Debug)]
pub struct StageGraph {
    graph: DiGraph<StageId, ()>,
    nodes: HashMap<StageId, NodeIndex>,
}

impl StageGraph {
    /// Graph of the standard release stages
    pub fn release() -> Self {
        Self::from_stages(&StageId::ALL, |stage| stage.predecessors().to_vec())
    }

    /// Build a graph from `stages` and a predecessor lookup
    ///
    /// Predecessors not listed in `stages` are ignored.
    pub fn from_stages<F>(stages: &[StageId], predecessors: F) -> Self
    where
        F: Fn(StageId) -> Vec<StageId>,
    {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for stage in stages {
            nodes.insert(*stage, graph.add_node(*stage));
        }

        for stage in stages {
            for predecessor in predecessors(*stage) {
                if let Some(from) = nodes.get(&predecessor) {
                    graph.add_edge(*from, nodes[stage], ());
                }
            }
        }

        Self { graph, nodes }
    }

    /// Stages in execution order
    pub fn execution_order(&self) -> Result<Vec<StageId>> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| StageError::CyclicGraph {
            stage: self.graph[cycle.node_id()].to_string(),
        })?;
        Ok(sorted.into_iter().map(|idx| self.graph[idx]).collect())
    }

    /// Direct predecessors of `stage` within this graph
    pub fn predecessors_of(&self, stage: StageId) -> Vec<StageId> {
        let Some(idx) = self.nodes.get(&stage) else {
            return Vec::new();
        };
        let mut preds: Vec<StageId> = self
            .graph
            .neighbors_directed(*idx, petgraph::Direction::Incoming)
            .map(|pred| self.graph[pred])
            .collect();
        preds.sort();
        preds
    }
}
