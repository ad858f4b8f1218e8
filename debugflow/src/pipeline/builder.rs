//! Pipeline builder with validation.

use super::{StageGraph, StageSpec};
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use std::collections::{HashMap, HashSet};

/// Default number of stages allowed to run at once.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Builder for creating validated stage graphs.
///
/// Stages may be added in any order; edges are checked when the graph is
/// built.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// The stage specifications.
    stages: HashMap<String, StageSpec>,
    /// Insertion order for stages.
    stage_order: Vec<String>,
    max_parallel: usize,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: HashMap::new(),
            stage_order: Vec::new(),
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the stage references itself.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Adds a stage specification in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the stage references itself.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.contains_key(&spec.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is registered twice",
                spec.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new("GRAPH-DUPLICATE", format!("Duplicate stage '{}'", spec.name))
                    .with_fix_hint("Give every stage a unique name."),
            ));
        }

        self.stage_order.push(spec.name.clone());
        self.stages.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Sets the upper bound on concurrently running stages (at least 1).
    #[must_use]
    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Builds the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages, an edge names an
    /// unknown stage, or the edges form a cycle.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages")
                .with_error_info(
                    ContractErrorInfo::new("GRAPH-EMPTY", "Cannot build an empty pipeline")
                        .with_fix_hint("Add at least one stage to the pipeline before building."),
                ));
        }

        self.check_edges()?;
        self.detect_cycles()?;

        Ok(StageGraph::new(
            self.name,
            self.stages,
            self.stage_order,
            self.max_parallel,
        ))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn check_edges(&self) -> Result<(), PipelineValidationError> {
        for name in &self.stage_order {
            let Some(spec) = self.stages.get(name) else {
                continue;
            };
            if let Some(missing) = spec.edges().find(|edge| !self.stages.contains_key(*edge)) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' references unknown stage '{}'",
                    spec.name, missing
                ))
                .with_stages(vec![spec.name.clone(), missing.clone()])
                .with_error_info(
                    ContractErrorInfo::new("GRAPH-MISSING", format!("Stage '{missing}' not found"))
                        .with_context_entry("stage", spec.name.clone())
                        .with_fix_hint("Register every stage named in an edge list."),
                ));
            }
        }
        Ok(())
    }

    /// Detects cycles across both edge kinds.
    fn detect_cycles(&self) -> Result<(), CycleDetectedError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for name in &self.stage_order {
            if !visited.contains(name) {
                if let Some(cycle) = self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path) {
                    return Err(CycleDetectedError::new(cycle));
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(spec) = self.stages.get(node) {
            for edge in spec.edges() {
                if !visited.contains(edge) {
                    if let Some(cycle) = self.dfs_cycle(edge, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(edge) {
                    let start = path.iter().position(|n| n == edge).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(edge.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}
