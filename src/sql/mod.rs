//! Statement text from a table binding and record keys; values always go through bound parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
