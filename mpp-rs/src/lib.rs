//! `mpp`: a line-oriented text macro preprocessor.
//!
//! See [`script`] for the directive language and [`Preprocessor`] for the
//! entry point.

pub mod cli;
pub mod config;
pub mod script;
pub mod var;

pub use config::{LineEnding, Options};
pub use script::{Diagnostic, Preprocessor, Source, SubstitutionMode, Value};
pub use var::VarStore;
