//! Error handling for the Judgment server core.

pub mod domain;

pub use domain::DomainError;
