//! Test utilities shared by Creator's integration tests.

pub mod env;
pub mod env_lock;
pub mod fixture;
pub mod ninja;

pub use fixture::UnitFixture;
