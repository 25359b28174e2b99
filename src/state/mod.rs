//! Client-side state modules.
//!
//! DESIGN
//! ======
//! State is split by concern (`session`, `auth`, `dashboard`) so commands
//! can depend on small focused models.

pub mod auth;
pub mod dashboard;
pub mod session;
