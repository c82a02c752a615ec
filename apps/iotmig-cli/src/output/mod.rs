//! Terminal output.

pub mod printer;
