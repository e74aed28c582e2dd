use crate::entry::CodeEntry;
use crate::Table;

/// Interpretation flags for observation results.
pub struct ObservationInterpretation;

impl Table for ObservationInterpretation {
    fn id(&self) -> &str {
        "observation-interpretation"
    }

    fn system(&self) -> &str {
        "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation"
    }

    fn version(&self) -> Option<&str> {
        Some("3.0.0")
    }

    fn entries(&self) -> &[CodeEntry] {
        static ENTRIES: std::sync::LazyLock<Vec<CodeEntry>> = std::sync::LazyLock::new(|| {
            vec![
                CodeEntry::new("N", "Normal"),
                CodeEntry::new("L", "Low"),
                CodeEntry::new("H", "High"),
                CodeEntry::new("LL", "Critical low"),
                CodeEntry::new("HH", "Critical high"),
                CodeEntry::new("A", "Abnormal"),
                // Code-only row: falls back to the raw code as its label.
                CodeEntry {
                    code: "IND".to_string(),
                    display: None,
                    localized_display: None,
                },
            ]
        });
        &ENTRIES
    }
}
