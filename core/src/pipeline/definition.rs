// core/src/pipeline/definition.rs

use crate::core::step::{Handler, SkipCondition, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;

/// A named-step workflow over the context type `TData`.
///
/// Handlers return `Result<PipelineControl, Err>`; framework failures
/// (a required step with no handler) surface as `FlowError` converted into
/// `Err`.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) name: &'static str,
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Declares the steps up front as `(name, optional, skip_if)`.
  pub fn new(name: &'static str, step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(step, optional, skip_if)| StepDef {
        name: (*step).to_string(),
        optional: *optional,
        skip_if: skip_if.clone(),
      })
      .collect();

    Self {
      name,
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
    }
  }

  /// Handlers can only be attached to declared steps. A typo here is a
  /// wiring bug, so it panics at construction time rather than at run time.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!(
        "pipeline '{}' setup error: step '{}' is not declared",
        self.name, step_name
      );
    }
  }
}
