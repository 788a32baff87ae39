#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod builder;
pub mod compare;
pub mod config;
pub mod constant;
mod error;
pub mod runner;
pub mod scheduler;
pub mod schema;
pub mod verdict;

pub use error::{Error, Result, SchemaError};
pub use verdict::{ExecutionResult, Outcome, Verdict};
