// core/src/pipeline/execution.rs

use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::core::step::{Handler, StepDef};
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, span, Instrument, Level};

enum PhaseOutcome<Err> {
  Continue,
  Stop,
  Failed(Err),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// A required step without handlers fails with `FlowError::HandlerMissing`.
  /// A handler error in a required step ends the run with that error; in an
  /// optional step it is logged and the run moves on to the next step.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(pipeline = self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_span = span!(
        Level::INFO,
        "pipeline_step",
        step_name = step_def.name.as_str(),
        step_index = step_idx,
        optional = step_def.optional
      );

      let outcome = self.run_step(step_def, ctx_data.clone()).instrument(step_span).await;
      match outcome {
        PhaseOutcome::Continue => {}
        PhaseOutcome::Stop => {
          event!(Level::INFO, step = %step_def.name, "Pipeline stopped by a handler.");
          return Ok(PipelineResult::Stopped);
        }
        PhaseOutcome::Failed(e) if step_def.optional => {
          event!(Level::WARN, step = %step_def.name, error = %e, "Optional step failed; continuing.");
        }
        PhaseOutcome::Failed(e) => return Err(e),
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }

  async fn run_step(&self, step_def: &StepDef<TData>, ctx_data: ContextData<TData>) -> PhaseOutcome<Err> {
    if let Some(skip) = &step_def.skip_if {
      if skip(ctx_data.clone()) {
        event!(Level::DEBUG, "Step skipped by its skip condition.");
        return PhaseOutcome::Continue;
      }
    }

    let name = step_def.name.as_str();
    let phases = [
      ("before", self.before.get(name)),
      ("on", self.on.get(name)),
    ];

    if phases.iter().all(|(_, handlers)| handlers.map_or(true, Vec::is_empty)) {
      if step_def.optional {
        event!(Level::DEBUG, "Optional step has no handlers, skipping.");
        return PhaseOutcome::Continue;
      }
      event!(Level::ERROR, "Required step has no handlers.");
      return PhaseOutcome::Failed(Err::from(FlowError::HandlerMissing {
        pipeline: self.name,
        step_name: step_def.name.clone(),
      }));
    }

    for (phase, handlers) in phases {
      let Some(handlers) = handlers else { continue };
      match run_phase(phase, handlers, &ctx_data).await {
        PhaseOutcome::Continue => {}
        other => return other,
      }
    }
    PhaseOutcome::Continue
  }
}

async fn run_phase<TData, Err>(
  phase: &'static str,
  handlers: &[Handler<TData, Err>],
  ctx_data: &ContextData<TData>,
) -> PhaseOutcome<Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (handler_idx, handler_fn) in handlers.iter().enumerate() {
    event!(Level::TRACE, phase, handler_index = handler_idx, "Running handler.");
    match handler_fn(ctx_data.clone()).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => return PhaseOutcome::Stop,
      Err(e) => {
        event!(Level::ERROR, phase, error = %e, "Handler failed.");
        return PhaseOutcome::Failed(e);
      }
    }
  }
  PhaseOutcome::Continue
}
