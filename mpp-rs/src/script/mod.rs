//! Preprocessor engine.
//!
//! The engine reads a source text line by line and interprets directive
//! lines, emitting everything else:
//!
//! - Conditionals: `#IF` … `#ELSEIF`/`#ELIF` … `#ELSE` … `#ENDIF`
//! - Selection: `#SWITCH name` … `#CASE v1, v2` … `#DEFAULT` … `#ENDSWITCH`
//! - Loops: `#FOR x IN a, b` or `#FOR i FROM 1 TO 9 STEP 2` … `#ENDFOR`/`#ENDF`
//! - `#SET name = expression` and `#INCLUDE path`
//! - `%name%` substitution in emitted lines
//!
//! # Quick start
//!
//! ```rust
//! use mpp::script::{Preprocessor, Source, SubstitutionMode};
//! use mpp::var::VarStore;
//!
//! let mut vars = VarStore::new();
//! vars.set("n", 2i64);
//! let mut pp = Preprocessor::new();
//! pp.set_line_ending("unix");
//! let out = pp.parse(
//!     Source::Text("#IF n > 1\nmany: %n%\n#ENDIF".into()),
//!     &vars,
//!     SubstitutionMode::Variables,
//! );
//! assert_eq!(out, "many: 2");
//! assert!(pp.errors().is_empty());
//! ```

pub mod control;
pub mod directive;
pub mod error;
pub mod expand;
pub mod expr;
pub mod interp;
pub mod looping;
pub mod token;
pub mod value;

// Re-exports for convenience.
pub use error::{Diagnostic, DirectiveError, EvalError};
pub use expand::SubstitutionMode;
pub use interp::{Preprocessor, Source};
pub use value::Value;
