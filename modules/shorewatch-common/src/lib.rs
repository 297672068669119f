pub mod config;
pub mod error;
pub mod events;
pub mod geo;
pub mod types;

pub use config::{Config, VerificationPolicy};
pub use error::ShorewatchError;
pub use events::Event;
pub use geo::*;
pub use types::*;
