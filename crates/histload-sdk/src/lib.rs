//! Shared types for the histload pipeline and its collaborators.

pub mod arrow;
pub mod catalog;
pub mod connector;
pub mod error;
pub mod prelude;
