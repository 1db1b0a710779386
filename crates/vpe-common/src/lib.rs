//! OpenVPE Common - Shared types for the vector packet-dispatch engine
//!
//! This crate provides the leaf types shared between the dataplane core and
//! the kernel-adjacent queue-steering component:
//! - Route decisions
//! - Error handling

#![warn(missing_docs)]

pub mod error;
pub mod route;

pub use error::*;
pub use route::*;
