// core/src/pipeline/mod.rs

//! `Pipeline<TData, Err>`: an ordered list of named steps, each with
//! `before` and `on` handlers, run against one shared context.

pub mod definition;
pub mod execution;
pub mod hooks;

pub use definition::Pipeline;
