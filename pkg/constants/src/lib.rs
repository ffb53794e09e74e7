//! Centralized constants for the yavdr-frontend supervisor.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod dbus;
pub mod paths;
pub mod timeouts;
