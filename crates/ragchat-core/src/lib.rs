pub mod config;
pub mod error;
pub mod token;
pub mod types;

pub use config::RagchatConfig;
pub use error::{CoreError, Result};
pub use token::{Credentials, FileTokenStore, MemoryTokenStore, TokenProvider};
pub use types::*;
