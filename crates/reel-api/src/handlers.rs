//! Request handlers.

pub mod generate;
pub mod health;
pub mod status;

pub use generate::*;
pub use health::*;
pub use status::*;
