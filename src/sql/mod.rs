//! SQL text from catalogue identifiers only; every value is a bound parameter.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
