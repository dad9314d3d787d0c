//! Data models for SpotAlert

mod alert;
mod price;
mod resource;

pub use alert::*;
pub use price::*;
pub use resource::*;
