pub mod error;
pub mod hash;
pub mod logging;

pub use error::AppError;
pub use hash::{hash_string, sha256_hex};
