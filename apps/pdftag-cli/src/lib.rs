//! Command-line front end for pdftag-core

pub mod config;
pub mod report;
