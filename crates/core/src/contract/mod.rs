#![forbid(unsafe_code)]

mod children;
mod decimal;
mod error;
mod fields;
mod text;

pub use children::*;
pub use decimal::*;
pub use error::*;
pub use fields::*;
pub use text::*;

#[cfg(test)]
mod tests;
