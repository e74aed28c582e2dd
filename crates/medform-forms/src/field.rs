//! Field identifiers and per-field behavior descriptors.

use std::fmt;

use medform_core::{Coding, Decimal, FieldValue, Path, QuantityValue, RangeValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::FormError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for FieldId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// How a field maps onto fragment paths.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Text { path: Path },
    Decimal { path: Path },
    Boolean { path: Path },
    /// Calendar date stored as `YYYY-MM-DD`.
    Date { path: Path },
    /// Coding object at `path`, resolved against `vocabulary`.
    Coded { path: Path, vocabulary: String },
    /// Decimal pair; present only when both bounds are.
    Range { low: Path, high: Path },
    /// Decimal with unit; present only when both parts are.
    Quantity { value: Path, unit: Path },
    /// Id of another entry, stored as a string.
    Reference { path: Path },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Decimal { .. } => "decimal",
            FieldKind::Boolean { .. } => "boolean",
            FieldKind::Date { .. } => "date",
            FieldKind::Coded { .. } => "coded",
            FieldKind::Range { .. } => "range",
            FieldKind::Quantity { .. } => "quantity",
            FieldKind::Reference { .. } => "reference",
        }
    }

    /// Whether `value` is a shape this kind can store. `Empty` fits all.
    pub fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (_, FieldValue::Empty)
                | (FieldKind::Text { .. }, FieldValue::Text(_))
                | (FieldKind::Decimal { .. }, FieldValue::Decimal(_))
                | (FieldKind::Boolean { .. }, FieldValue::Boolean(_))
                | (FieldKind::Date { .. }, FieldValue::Date(_))
                | (FieldKind::Coded { .. }, FieldValue::Code(_))
                | (FieldKind::Range { .. }, FieldValue::Range(_))
                | (FieldKind::Quantity { .. }, FieldValue::Quantity(_))
                | (FieldKind::Reference { .. }, FieldValue::Reference(_))
        )
    }

    /// Vocabulary the field resolves against, if coded.
    pub fn vocabulary(&self) -> Option<&str> {
        match self {
            FieldKind::Coded { vocabulary, .. } => Some(vocabulary),
            _ => None,
        }
    }
}

/// One editable field of a form.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub id: FieldId,
    pub label: String,
    pub kind: FieldKind,
    /// Counts toward "the user entered something" when deciding whether to
    /// write derived fields at all.
    pub meaningful: bool,
    /// Required regardless of dependencies.
    pub required: bool,
}

impl FieldSpec {
    pub fn new(id: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            id: FieldId::from(id),
            label: label.to_string(),
            kind,
            meaningful: true,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Read typed text into a value of this field's kind. Blank input is
    /// [`FieldValue::Empty`].
    ///
    /// Ranges are written `low..high` (either side may be left out),
    /// quantities `value unit`, booleans `yes`/`no`, dates `YYYY-MM-DD`.
    /// Coded fields take the raw code unchecked; use
    /// [`FieldBinder::parse_input`](crate::binder::FieldBinder::parse_input)
    /// to resolve codes and labels against the catalog.
    pub fn parse_input(&self, text: &str) -> Result<FieldValue, FormError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(FieldValue::Empty);
        }
        let invalid = |reason: String| FormError::InvalidInput {
            field: self.id.to_string(),
            reason,
        };
        let decimal = |s: &str| Decimal::parse(s).map_err(|e| invalid(e.to_string()));
        let optional_decimal = |s: &str| {
            let s = s.trim();
            if s.is_empty() { Ok(None) } else { decimal(s).map(Some) }
        };

        let value = match &self.kind {
            FieldKind::Text { .. } => FieldValue::text(text),
            FieldKind::Decimal { .. } => FieldValue::Decimal(decimal(text)?),
            FieldKind::Boolean { .. } => match text.to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => FieldValue::Boolean(true),
                "no" | "false" | "0" => FieldValue::Boolean(false),
                other => return Err(invalid(format!("expected yes or no, got '{other}'"))),
            },
            FieldKind::Date { .. } => FieldValue::Date(
                text.parse::<jiff::civil::Date>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            FieldKind::Coded { .. } => FieldValue::code(text),
            FieldKind::Range { .. } => {
                let (low, high) = text
                    .split_once("..")
                    .ok_or_else(|| invalid("expected low..high".to_string()))?;
                FieldValue::Range(RangeValue {
                    low: optional_decimal(low)?,
                    high: optional_decimal(high)?,
                })
            }
            FieldKind::Quantity { .. } => {
                let (value, unit) = match text.split_once(char::is_whitespace) {
                    Some((value, unit)) => (value, Some(unit.trim().to_string())),
                    None => (text, None),
                };
                FieldValue::Quantity(QuantityValue {
                    value: Some(decimal(value)?),
                    unit,
                })
            }
            FieldKind::Reference { .. } => FieldValue::Reference(text.to_string()),
        };
        Ok(value)
    }

    /// Exclude from the meaningful-data check (e.g. a date that is only
    /// context for other entries).
    pub fn auxiliary(mut self) -> Self {
        self.meaningful = false;
        self
    }
}

/// Values the binder writes on its own whenever the fragment carries
/// meaningful user data.
#[derive(Debug, Clone)]
pub enum Derived {
    /// Constant JSON value, e.g. a status marker.
    Fixed { path: Path, value: Value },
    /// Fixed classification coding.
    FixedCoding { path: Path, coding: Coding },
    /// Subject/owner reference taken from the form context.
    Subject { path: Path },
    /// Identity of the repeatable entry the fragment backs.
    EntryId { path: Path },
}
