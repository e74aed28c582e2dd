use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::decimal::Decimal;

/// Value of one form field, as exchanged with the input widgets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
#[ts(export)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Decimal(Decimal),
    Boolean(bool),
    Date(jiff::civil::Date),
    /// Raw code of a vocabulary-backed field.
    Code(String),
    Range(RangeValue),
    Quantity(QuantityValue),
    /// Identity of another entry (e.g. a repeatable-group entry id).
    Reference(String),
}

/// Lower/upper decimal pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RangeValue {
    pub low: Option<Decimal>,
    pub high: Option<Decimal>,
}

/// Decimal with a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuantityValue {
    pub value: Option<Decimal>,
    pub unit: Option<String>,
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn code(s: impl Into<String>) -> Self {
        FieldValue::Code(s.into())
    }

    /// True when the user has entered nothing. Partially filled composites
    /// are not empty; see [`FieldValue::is_complete`].
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(s) | FieldValue::Code(s) | FieldValue::Reference(s) => {
                s.trim().is_empty()
            }
            FieldValue::Decimal(_) | FieldValue::Boolean(_) | FieldValue::Date(_) => false,
            FieldValue::Range(r) => r.low.is_none() && r.high.is_none(),
            FieldValue::Quantity(q) => {
                q.value.is_none() && q.unit.as_deref().is_none_or(|u| u.trim().is_empty())
            }
        }
    }

    /// True when every required part is present. Scalars are complete when
    /// non-empty.
    pub fn is_complete(&self) -> bool {
        match self {
            FieldValue::Range(r) => r.low.is_some() && r.high.is_some(),
            FieldValue::Quantity(q) => {
                q.value.is_some() && q.unit.as_deref().is_some_and(|u| !u.trim().is_empty())
            }
            other => !other.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Code(s) | FieldValue::Reference(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<jiff::civil::Date> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<&Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(d),
            _ => None,
        }
    }
}
