//! Reference plugins shipped with the whitelist (spec.md §4.13).

pub mod feedpoll;
pub mod heartbeat;
