//! # Hyspania
//!
//! Backend for a community directory of game servers. Visitors browse the
//! listing, vote for a server once a day and submit one server of their own.
//!
//! ## Modules
//!
//! - [`directory`]: server listing and registration
//! - [`votes`]: vote casting and cooldown status
//! - [`store`]: JSON documents with locked writes
//! - [`identity`]: hashed client identifiers used for rate limiting
//! - [`lenient`]: forgiving field decoders for stored records and request bodies
//! - [`api`]: axum router and handlers
//! - [`common`]: configuration and logging

pub mod api;
pub mod clock;
pub mod common;
pub mod directory;
pub mod error;
pub mod identity;
pub mod lenient;
pub mod store;
pub mod validation;
pub mod votes;

pub use api::{build_router, AppState};
pub use error::AppError;
