// Utility functions
pub mod error;
#[cfg(test)]
pub mod test_server;

pub use error::*;
