#![deny(missing_docs)]

//! Execution-layer primitives used by runtimes and physical operators.
//!
//! Architecture role:
//! - task context and execution node contracts
//! - expression compilation/evaluation, including the array sublanguage
//!   (zip, transform, left-fold aggregate)
//! - batch stream abstractions
//!
//! Key modules:
//! - [`context`]
//! - [`exec_node`]
//! - [`expressions`]
//! - [`operators`]
//! - [`stream`]

pub mod context;
pub mod exec_node;
pub mod expressions;
pub mod operators;
pub mod stream;

// Re-export only what you want at the crate root (no globs).
pub use context::{SharedTaskContext, TaskContext};
pub use exec_node::ExecNode;
pub use expressions::{PhysicalExpr, compile_expr};
pub use operators::{FilterExec, LimitExec, MemScanExec, ProjectionExec};
pub use stream::{RecordBatchStream, SendableRecordBatchStream, StreamAdapter};
