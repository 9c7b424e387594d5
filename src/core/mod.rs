//! File discovery helpers

pub mod git;
pub mod language;
