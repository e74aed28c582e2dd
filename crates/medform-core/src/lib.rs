//! medform-core
//!
//! Pure record-side types: typed paths, path-addressed fragments, codings,
//! decimal strings and field values. No I/O and no async; this is the shared
//! vocabulary of the medform crates.

pub mod coding;
pub mod decimal;
pub mod error;
pub mod fragment;
pub mod path;
pub mod record;
pub mod value;

pub use crate::coding::Coding;
pub use crate::decimal::Decimal;
pub use crate::error::CoreError;
pub use crate::fragment::{Fragment, FragmentKey};
pub use crate::path::{Path, Segment};
pub use crate::record::PathRecord;
pub use crate::value::{FieldValue, QuantityValue, RangeValue};
