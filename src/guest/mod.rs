//! Component B: the guest-state schema and lazy-flag encoding.

pub mod amd64;
pub mod ccop;
pub mod schema;

pub use amd64::Amd64Schema;
pub use ccop::{CcOp, Condition};
pub use schema::GuestSchema;
