pub mod classifier;
pub mod config;
pub mod error;
pub mod io;
pub mod paths;
pub mod question;
pub mod script;
pub mod session;
pub mod types;
pub mod walker;

pub use error::{Result, StepworkError};
