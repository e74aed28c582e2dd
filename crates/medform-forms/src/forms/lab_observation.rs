//! A single lab result with reference range and interpretation.

use medform_core::{Coding, Path};
use serde_json::json;

use crate::dependency::{Condition, DependencyEdge, Effect};
use crate::error::FormError;
use crate::field::{Derived, FieldKind, FieldSpec};
use crate::form::FormDefinition;

pub const NAME: &str = "lab-observation";

/// Interpretation codes that call for a free-text note.
pub const ABNORMAL: [&str; 5] = ["L", "H", "LL", "HH", "A"];

pub fn definition() -> Result<FormDefinition, FormError> {
    FormDefinition::builder(NAME, Path::lit("Observation"))
        .field(FieldSpec::new(
            "value",
            "Result",
            FieldKind::Quantity {
                value: Path::lit("valueQuantity.value"),
                unit: Path::lit("valueQuantity.unit"),
            },
        ))
        .field(FieldSpec::new(
            "reference_range",
            "Reference range",
            FieldKind::Range {
                low: Path::lit("referenceRange[0].low.value"),
                high: Path::lit("referenceRange[0].high.value"),
            },
        ))
        .field(FieldSpec::new(
            "interpretation",
            "Interpretation",
            FieldKind::Coded {
                path: Path::lit("interpretation[0].coding[0]"),
                vocabulary: "observation-interpretation".to_string(),
            },
        ))
        .field(FieldSpec::new(
            "note",
            "Note",
            FieldKind::Text {
                path: Path::lit("note[0].text"),
            },
        ))
        .field(
            FieldSpec::new(
                "effective_on",
                "Effective date",
                FieldKind::Date {
                    path: Path::lit("effectiveDateTime"),
                },
            )
            .auxiliary(),
        )
        .field(
            FieldSpec::new(
                "measuring_device",
                "Measuring device",
                FieldKind::Reference {
                    path: Path::lit("device.reference"),
                },
            )
            .auxiliary(),
        )
        .edge(DependencyEdge::new(
            "interpretation",
            Condition::CodeIn(ABNORMAL.iter().map(|c| c.to_string()).collect()),
            Effect::SetRequired,
            "note",
        ))
        .edge(DependencyEdge::new(
            "value",
            Condition::Filled,
            Effect::SetRequired,
            "effective_on",
        ))
        .edge(DependencyEdge::new(
            "value",
            Condition::Empty,
            Effect::SetDisabled,
            "interpretation",
        ))
        .edge(DependencyEdge::new(
            "value",
            Condition::Empty,
            Effect::ResetValue,
            "interpretation",
        ))
        .derived(Derived::Fixed {
            path: Path::lit("resourceType"),
            value: json!("Observation"),
        })
        .derived(Derived::Fixed {
            path: Path::lit("status"),
            value: json!("final"),
        })
        .derived(Derived::FixedCoding {
            path: Path::lit("category[0].coding[0]"),
            coding: Coding {
                system: Some(
                    "http://terminology.hl7.org/CodeSystem/observation-category".to_string(),
                ),
                version: None,
                code: "laboratory".to_string(),
                display: Some("Laboratory".to_string()),
            },
        })
        .derived(Derived::Subject {
            path: Path::lit("subject.reference"),
        })
        .build()
}
