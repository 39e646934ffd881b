//! Run status machine
//!
//! The status machine is explicit, finite, and deterministic. The profile
//! executor owns one status value and routes every command through
//! [`RunStatus::transition`].

pub mod events;
pub mod machine;

pub use events::RunEvent;
pub use machine::RunStatus;
