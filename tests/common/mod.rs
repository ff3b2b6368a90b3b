//! Shared test utilities for dataselectie integration harnesses.
//!
//! Import everything you need via `mod common; use common::*;` at the top of
//! each harness file. Corpora are deterministic; counters on the in-memory
//! collaborators make call counts observable.

pub mod assertions;
pub mod builders;
pub mod fake_elastic;
pub mod fakes;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fakes::*;
pub use fixtures::*;
