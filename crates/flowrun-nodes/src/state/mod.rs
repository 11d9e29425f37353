//! Runners reading and writing scoped variables.

pub mod cache;
pub mod variable;

pub use cache::{CACHE_GET_NODE_TYPE, CACHE_SET_NODE_TYPE, CacheGetRunner, CacheSetRunner};
pub use variable::{VariableConfig, VariableOp, VariableRunner, is_valid_variable_name};
