//! Command handlers
//!
//! One module per subcommand. Each returns `anyhow::Result` so `main` can
//! print the error chain and exit non-zero.

pub mod export;
pub mod pack;
