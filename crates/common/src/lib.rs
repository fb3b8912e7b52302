pub mod config;
pub mod error;
pub mod source;
pub mod types;
pub mod universe;

pub use config::Config;
pub use error::{Error, Result};
pub use source::DataSource;
pub use types::*;
pub use universe::Universe;
