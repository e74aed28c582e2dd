//! Implanted devices: one repeatable entry per device.

use medform_core::{Coding, Path};
use serde_json::json;

use crate::dependency::{Condition, DependencyEdge, Effect};
use crate::error::FormError;
use crate::field::{Derived, FieldKind, FieldSpec};
use crate::form::FormDefinition;
use crate::validation::{Constraint, Rule};

pub const NAME: &str = "implanted-device";

pub fn definition() -> Result<FormDefinition, FormError> {
    FormDefinition::builder(NAME, Path::lit("Device"))
        .repeatable()
        .field(
            FieldSpec::new(
                "device_kind",
                "Device",
                FieldKind::Coded {
                    path: Path::lit("type.coding[0]"),
                    vocabulary: "device-kind".to_string(),
                },
            )
            .required(),
        )
        .field(FieldSpec::new(
            "status",
            "Status",
            FieldKind::Coded {
                path: Path::lit("statusCoding"),
                vocabulary: "device-status".to_string(),
            },
        ))
        .field(FieldSpec::new(
            "udi",
            "UDI",
            FieldKind::Text {
                path: Path::lit("udiCarrier[0].deviceIdentifier"),
            },
        ))
        .field(FieldSpec::new(
            "body_site",
            "Body site",
            FieldKind::Coded {
                path: Path::lit("bodySite.coding[0]"),
                vocabulary: "body-site".to_string(),
            },
        ))
        .field(FieldSpec::new(
            "implanted_on",
            "Implanted on",
            FieldKind::Date {
                path: Path::lit("extension.implantDate"),
            },
        ))
        .field(
            FieldSpec::new(
                "removed_on",
                "Removed on",
                FieldKind::Date {
                    path: Path::lit("extension.explantDate"),
                },
            )
            .auxiliary(),
        )
        .field(
            FieldSpec::new(
                "removal_reason",
                "Reason for removal",
                FieldKind::Text {
                    path: Path::lit("note[0].text"),
                },
            )
            .auxiliary(),
        )
        .edge(DependencyEdge::new(
            "removed_on",
            Condition::Filled,
            Effect::SetRequired,
            "removal_reason",
        ))
        .edge(DependencyEdge::new(
            "removed_on",
            Condition::Filled,
            Effect::SetVisible,
            "removal_reason",
        ))
        .edge(DependencyEdge::new(
            "removed_on",
            Condition::Empty,
            Effect::ResetValue,
            "removal_reason",
        ))
        .constraint(Constraint::new("implanted_on", Rule::NotAfter, "removed_on"))
        .constraint(Constraint::new("removed_on", Rule::NotBefore, "implanted_on"))
        .derived(Derived::Fixed {
            path: Path::lit("resourceType"),
            value: json!("Device"),
        })
        .derived(Derived::EntryId {
            path: Path::lit("identifier[0].value"),
        })
        .derived(Derived::Subject {
            path: Path::lit("patient.reference"),
        })
        .derived(Derived::FixedCoding {
            path: Path::lit("category[0].coding[0]"),
            coding: Coding {
                system: Some("http://snomed.info/sct".to_string()),
                version: None,
                code: "40388003".to_string(),
                display: Some("Implant".to_string()),
            },
        })
        .build()
}
