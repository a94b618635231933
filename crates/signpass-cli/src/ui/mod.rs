//! Terminal output
//!
//! Progress goes to stderr so stdout carries only the produced path.

pub mod reporter;
pub mod theme;

pub use reporter::ConsoleReporter;
pub use theme::Theme;
