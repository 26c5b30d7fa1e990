//! Route builders shared by consumers.

mod common;
pub use common::common_routes;
