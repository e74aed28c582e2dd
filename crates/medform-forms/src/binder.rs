//! Fragment ⇄ field-value mapping.
//!
//! `populate` reads each bound path into a [`FieldValue`]; `extract` clears
//! the fragment and rewrites it from the current values. A fragment with no
//! meaningful user data is left empty, derived fields included.

use std::collections::{BTreeMap, BTreeSet};

use medform_core::{Coding, Decimal, FieldValue, PathRecord, QuantityValue, RangeValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use medform_vocab::{Catalogs, CodeCatalog};

use crate::context::FormContext;
use crate::error::FormError;
use crate::field::{Derived, FieldId, FieldKind, FieldSpec};
use crate::form::FormDefinition;

/// Stored shapes seen at populate time, by field.
///
/// Full codings are used on extract when the current vocabulary can no
/// longer resolve a code the fragment already carried. Text fields read
/// from a JSON number are written back as a number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodingMemory {
    codings: BTreeMap<FieldId, Coding>,
    #[serde(default)]
    numeric_text: BTreeSet<FieldId>,
}

impl CodingMemory {
    pub fn get(&self, field: &FieldId) -> Option<&Coding> {
        self.codings.get(field)
    }

    pub fn insert(&mut self, field: FieldId, coding: Coding) {
        self.codings.insert(field, coding);
    }

    pub fn mark_numeric_text(&mut self, field: FieldId) {
        self.numeric_text.insert(field);
    }

    pub fn is_numeric_text(&self, field: &FieldId) -> bool {
        self.numeric_text.contains(field)
    }

    /// Number of remembered codings.
    pub fn len(&self) -> usize {
        self.codings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codings.is_empty()
    }
}

/// A stored code the current vocabulary does not know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyDrift {
    pub field: FieldId,
    pub vocabulary: String,
    pub code: String,
    /// On extract: whether the last-known coding was re-written unchanged.
    pub preserved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Populated {
    pub values: BTreeMap<FieldId, FieldValue>,
    /// Display labels for coded fields: catalog label, or the raw code.
    pub labels: BTreeMap<FieldId, String>,
    pub codings: CodingMemory,
    pub drift: Vec<VocabularyDrift>,
}

impl Populated {
    /// Copy every populated value into `ctx`.
    pub fn apply_to(&self, ctx: &mut FormContext) {
        for (field, value) in &self.values {
            ctx.set_value(field, value.clone());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// False when nothing meaningful was entered and the fragment was left
    /// cleared.
    pub written: bool,
    /// Composite fields dropped because a part was missing.
    pub incomplete: Vec<FieldId>,
    pub drift: Vec<VocabularyDrift>,
}

pub struct FieldBinder<'a> {
    form: &'a FormDefinition,
    catalogs: &'a Catalogs,
}

impl<'a> FieldBinder<'a> {
    /// Bind `form` to the loaded catalogs. Fails if a coded field's
    /// vocabulary was not loaded at start-up.
    pub fn new(form: &'a FormDefinition, catalogs: &'a Catalogs) -> Result<Self, FormError> {
        for field in form.fields() {
            if let Some(vocabulary) = field.kind.vocabulary()
                && catalogs.get(vocabulary).is_none()
            {
                return Err(FormError::MissingCatalog {
                    field: field.id.to_string(),
                    vocabulary: vocabulary.to_string(),
                });
            }
        }
        Ok(Self { form, catalogs })
    }

    pub fn form(&self) -> &FormDefinition {
        self.form
    }

    fn catalog(&self, vocabulary: &str) -> Option<&CodeCatalog> {
        self.catalogs.get(vocabulary)
    }

    /// Read every bound field from `record`.
    pub fn populate(&self, record: &impl PathRecord) -> Populated {
        let mut out = Populated::default();

        for field in self.form.fields() {
            let value = self.read_field(field, record, &mut out);
            if !value.is_empty() {
                out.values.insert(field.id.clone(), value);
            }
        }

        debug!(
            key = %record.absolute_key(),
            fields = out.values.len(),
            drift = out.drift.len(),
            "fragment populated"
        );
        out
    }

    fn read_field(
        &self,
        field: &FieldSpec,
        record: &impl PathRecord,
        out: &mut Populated,
    ) -> FieldValue {
        match &field.kind {
            FieldKind::Text { path } => match record.get(path) {
                Some(Value::String(s)) => FieldValue::Text(s.clone()),
                Some(Value::Number(n)) => {
                    out.codings.mark_numeric_text(field.id.clone());
                    FieldValue::Text(n.to_string())
                }
                _ => FieldValue::Empty,
            },
            FieldKind::Decimal { path } => record
                .get(path)
                .and_then(Decimal::from_value)
                .map_or(FieldValue::Empty, FieldValue::Decimal),
            FieldKind::Boolean { path } => record
                .get(path)
                .and_then(Value::as_bool)
                .map_or(FieldValue::Empty, FieldValue::Boolean),
            FieldKind::Date { path } => {
                let Some(text) = record.get(path).and_then(Value::as_str) else {
                    return FieldValue::Empty;
                };
                match text.get(..10).unwrap_or(text).parse::<jiff::civil::Date>() {
                    Ok(date) => FieldValue::Date(date),
                    Err(e) => {
                        warn!(field = %field.id, value = %text, error = %e, "unreadable stored date");
                        FieldValue::Empty
                    }
                }
            }
            FieldKind::Coded { path, vocabulary } => {
                let Some(coding) = record.get(path).and_then(Coding::from_value) else {
                    return FieldValue::Empty;
                };
                let label = match self.catalog(vocabulary).and_then(|c| c.resolve(&coding.code)) {
                    Some(entry) => entry.label().to_string(),
                    None => {
                        warn!(
                            field = %field.id,
                            vocabulary = %vocabulary,
                            code = %coding.code,
                            "stored code not in current vocabulary"
                        );
                        out.drift.push(VocabularyDrift {
                            field: field.id.clone(),
                            vocabulary: vocabulary.clone(),
                            code: coding.code.clone(),
                            preserved: false,
                        });
                        coding.code.clone()
                    }
                };
                out.labels.insert(field.id.clone(), label);
                let code = coding.code.clone();
                out.codings.insert(field.id.clone(), coding);
                FieldValue::Code(code)
            }
            FieldKind::Range { low, high } => {
                let range = RangeValue {
                    low: record.get(low).and_then(Decimal::from_value),
                    high: record.get(high).and_then(Decimal::from_value),
                };
                if range.low.is_none() && range.high.is_none() {
                    FieldValue::Empty
                } else {
                    FieldValue::Range(range)
                }
            }
            FieldKind::Quantity { value, unit } => {
                let quantity = QuantityValue {
                    value: record.get(value).and_then(Decimal::from_value),
                    unit: record.get(unit).and_then(Value::as_str).map(str::to_string),
                };
                if quantity.value.is_none() && quantity.unit.is_none() {
                    FieldValue::Empty
                } else {
                    FieldValue::Quantity(quantity)
                }
            }
            FieldKind::Reference { path } => record
                .get(path)
                .and_then(Value::as_str)
                .map_or(FieldValue::Empty, |s| FieldValue::Reference(s.to_string())),
        }
    }

    /// Read typed text for `field`, checking coded input against its
    /// catalog.
    ///
    /// Coded text is taken as a code when the catalog knows it, else as a
    /// display label. A code the catalog no longer lists is accepted only
    /// when it is the code the fragment already carried. Anything else is
    /// rejected rather than stored as drift.
    pub fn parse_input(
        &self,
        field: &str,
        text: &str,
        codings: &CodingMemory,
    ) -> Result<FieldValue, FormError> {
        let spec = self.form.require_field(field)?;
        let FieldKind::Coded { vocabulary, .. } = &spec.kind else {
            return spec.parse_input(text);
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(FieldValue::Empty);
        }

        let catalog = self.catalog(vocabulary);
        if catalog.is_some_and(|c| c.resolve(text).is_some()) {
            return Ok(FieldValue::code(text));
        }
        if let Some(code) = catalog.and_then(|c| c.code_for_label(text)) {
            debug!(field = %spec.id, label = text, code, "label mapped to code");
            return Ok(FieldValue::code(code));
        }
        if codings.get(&spec.id).is_some_and(|c| c.code == text) {
            return Ok(FieldValue::code(text));
        }
        Err(FormError::InvalidInput {
            field: spec.id.to_string(),
            reason: format!("'{text}' is neither a code nor a label in vocabulary '{vocabulary}'"),
        })
    }

    /// Label to show for a coded field's value: the catalog label, or the
    /// raw code when the catalog cannot resolve it.
    pub fn display_label(&self, field: &FieldId, value: &FieldValue) -> Option<String> {
        let spec = self.form.field(field.as_str())?;
        let code = match value {
            FieldValue::Code(code) => code,
            _ => return None,
        };
        let label = spec
            .kind
            .vocabulary()
            .and_then(|v| self.catalog(v))
            .and_then(|c| c.resolve(code))
            .map(|e| e.label().to_string())
            .unwrap_or_else(|| code.clone());
        Some(label)
    }

    /// Whether any meaningful field carries a complete value.
    pub fn has_meaningful_data(&self, ctx: &FormContext) -> bool {
        self.form
            .fields()
            .iter()
            .filter(|f| f.meaningful)
            .any(|f| ctx.value(&f.id).is_complete())
    }

    /// Rewrite `record` from the values in `ctx`.
    ///
    /// The record is always cleared first. Nothing is written back unless at
    /// least one meaningful field has a value; composites missing a part are
    /// treated as absent.
    pub fn extract(
        &self,
        ctx: &FormContext,
        record: &mut impl PathRecord,
        codings: &CodingMemory,
    ) -> Extracted {
        let mut out = Extracted::default();
        record.clear();

        if !self.has_meaningful_data(ctx) {
            debug!(key = %record.absolute_key(), "no meaningful data, fragment left empty");
            return out;
        }

        for field in self.form.fields() {
            let value = ctx.value(&field.id);
            if value.is_empty() {
                continue;
            }
            if !value.is_complete() {
                out.incomplete.push(field.id.clone());
                continue;
            }
            self.write_field(field, value, record, codings, &mut out);
        }

        for derived in self.form.derived() {
            match derived {
                Derived::Fixed { path, value } => record.set(path, value.clone()),
                Derived::FixedCoding { path, coding } => record.set(path, coding.to_value()),
                Derived::Subject { path } => {
                    if let Some(subject) = ctx.subject() {
                        record.set(path, Value::String(subject.to_string()));
                    }
                }
                Derived::EntryId { path } => {
                    if let Some(id) = ctx.entry_id() {
                        record.set(path, Value::String(id.to_string()));
                    }
                }
            }
        }

        out.written = true;
        debug!(
            key = %record.absolute_key(),
            incomplete = out.incomplete.len(),
            "fragment extracted"
        );
        out
    }

    fn write_field(
        &self,
        field: &FieldSpec,
        value: &FieldValue,
        record: &mut impl PathRecord,
        codings: &CodingMemory,
        out: &mut Extracted,
    ) {
        match (&field.kind, value) {
            (FieldKind::Text { path }, FieldValue::Text(s)) => {
                let number = codings
                    .is_numeric_text(&field.id)
                    .then(|| Decimal::parse(s).ok())
                    .flatten();
                match number {
                    Some(d) => record.set(path, d.to_value()),
                    None => record.set(path, Value::String(s.clone())),
                }
            }
            (FieldKind::Decimal { path }, FieldValue::Decimal(d)) => {
                record.set(path, d.to_value());
            }
            (FieldKind::Boolean { path }, FieldValue::Boolean(b)) => {
                record.set(path, Value::Bool(*b));
            }
            (FieldKind::Date { path }, FieldValue::Date(d)) => {
                record.set(path, Value::String(d.to_string()));
            }
            (FieldKind::Coded { path, vocabulary }, FieldValue::Code(code)) => {
                let coding = self.coding_to_write(field, vocabulary, code, codings, out);
                record.set(path, coding.to_value());
            }
            (FieldKind::Range { low, high }, FieldValue::Range(range)) => {
                if let (Some(l), Some(h)) = (&range.low, &range.high) {
                    record.set(low, l.to_value());
                    record.set(high, h.to_value());
                }
            }
            (FieldKind::Quantity { value, unit }, FieldValue::Quantity(q)) => {
                if let (Some(v), Some(u)) = (&q.value, &q.unit) {
                    record.set(value, v.to_value());
                    record.set(unit, Value::String(u.clone()));
                }
            }
            (FieldKind::Reference { path }, FieldValue::Reference(id)) => {
                record.set(path, Value::String(id.clone()));
            }
            (kind, _) => {
                warn!(field = %field.id, kind = kind.name(), "value does not fit field kind, skipped");
            }
        }
    }

    /// Fresh coding from the current catalog first; else the coding captured
    /// at populate time if it carries the same code; else a bare coding.
    fn coding_to_write(
        &self,
        field: &FieldSpec,
        vocabulary: &str,
        code: &str,
        codings: &CodingMemory,
        out: &mut Extracted,
    ) -> Coding {
        let catalog = self.catalog(vocabulary);
        if let Some(fresh) = catalog.and_then(|c| c.coding_for(code)) {
            return fresh;
        }

        let remembered = codings.get(&field.id).filter(|c| c.code == code);
        out.drift.push(VocabularyDrift {
            field: field.id.clone(),
            vocabulary: vocabulary.to_string(),
            code: code.to_string(),
            preserved: remembered.is_some(),
        });

        match remembered {
            Some(previous) => {
                debug!(field = %field.id, code, "re-writing last-known coding");
                previous.clone()
            }
            None => {
                warn!(field = %field.id, vocabulary, code, "writing bare coding for unknown code");
                Coding {
                    system: catalog.map(|c| c.system().to_string()),
                    version: None,
                    code: code.to_string(),
                    display: None,
                }
            }
        }
    }
}
