//! Code generation for studies and assays
//!
//! Codes are derived from the parent's code and a per-prefix ordinal:
//! - Study: `"{programCode}-{start + n}"`, e.g. `CPA-10001`
//! - Assay: `"{studyCode}-{start + n}"`, e.g. `PPB-10001-001`
//! - External study code: `"{collaboratorCode}-{start + n}"`
//!
//! Two strategies produce the ordinal `n`:
//! - [`CodeStrategy::DerivedCount`] counts existing records at call time.
//!   Concurrent creations under one parent can observe the same count and
//!   compute the same code; only the store's uniqueness check catches it.
//! - [`CodeStrategy::Sequence`] asks the store for the next value of a
//!   per-prefix counter that never drops below the highest code already in
//!   use, deprecated and legacy records included.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod format;
pub mod generator;
pub mod sequence;

pub use error::{CodeError, CounterError};
pub use format::{code_suffix, format_code};
pub use generator::{CodeCounter, CodeGenerator, CodeSettings, CodeStrategy};
pub use sequence::{SequenceScope, SequenceStore};
