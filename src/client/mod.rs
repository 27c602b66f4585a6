//! Gorgias API client and authentication.
//!
//! This module provides the [`GorgiasClient`] used by every stream, along with
//! the [`Auth`] credential type and the client's [`RetryPolicy`].

mod auth;
mod gorgias;

pub use auth::Auth;
pub use gorgias::{GorgiasClient, RetryPolicy};
