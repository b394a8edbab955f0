//! Grant store domain types.
//!
//! - [`Grant`] - a persisted authorization artifact
//! - [`GrantFilter`] - subject-rooted lookup criteria
//! - [`grant_types`] - well-known grant type names

pub mod filter;
pub mod grant;

pub use filter::GrantFilter;
pub use grant::{Grant, grant_types};
