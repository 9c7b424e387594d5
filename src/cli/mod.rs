//! CLI command implementations

pub mod ask;
pub mod check;
pub mod clear;
pub mod index;
pub mod info;
pub mod tree;
