//! Stage specifications: a stage plus its edges.

use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::stages::Stage;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Specification for a single node in a stage graph.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Stages scheduled whenever this one is, and finished before it starts.
    pub depends_on: BTreeSet<String>,
    /// Stages that, if also scheduled, must finish before this one starts.
    pub must_run_after: BTreeSet<String>,
}

impl StageSpec {
    /// Creates a spec named after the stage, with no edges.
    #[must_use]
    pub fn new(runner: Arc<dyn Stage>) -> Self {
        Self {
            name: runner.name().to_string(),
            runner,
            depends_on: BTreeSet::new(),
            must_run_after: BTreeSet::new(),
        }
    }

    /// Adds depends-on edges.
    #[must_use]
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds must-run-after edges.
    #[must_use]
    pub fn must_run_after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.must_run_after.extend(names.into_iter().map(Into::into));
        self
    }

    /// The stage description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.runner.description()
    }

    /// Iterates over every edge target, of either kind.
    pub fn edges(&self) -> impl Iterator<Item = &String> {
        self.depends_on.iter().chain(self.must_run_after.iter())
    }

    /// Validates the spec on its own.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage has an edge to itself.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.edges().any(|edge| edge == &self.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' cannot depend on or run after itself",
                self.name
            ))
            .with_stages(vec![self.name.clone()])
            .with_error_info(
                ContractErrorInfo::new("GRAPH-SELF", "Self-referencing edge")
                    .with_fix_hint("Remove the stage from its own edge lists."),
            ));
        }
        Ok(())
    }
}
