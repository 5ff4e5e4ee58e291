//! Lifecycle management for data access requests.
//!
//! A requester asks for access to a protected dataset for a stated purpose;
//! the dataset's owners approve, deny, or provision the request. Every status
//! change is journaled as a new status-info version so the full history of a
//! request stays auditable.

pub mod authz;
pub mod diff;
pub mod error;
pub mod identity;
pub mod request;
pub mod service;
pub mod store;
pub mod urn;
pub mod utils;
