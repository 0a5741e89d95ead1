#![forbid(unsafe_code)]

//! Shared environment constants for creator tests.

/// Environment variable override for the Ninja executable.
pub const NINJA_ENV: &str = "CREATOR_NINJA";

/// Environment variable listing extra unit search path directories.
pub const CREATORPATH_ENV: &str = "CREATORPATH";
