//! Secret resolution backends.

pub mod env;

pub use env::EnvKeySource;
