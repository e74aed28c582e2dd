use crate::entry::CodeEntry;
use crate::Table;

/// Implantable and attached device kinds (SNOMED CT).
pub struct DeviceKind;

impl Table for DeviceKind {
    fn id(&self) -> &str {
        "device-kind"
    }

    fn system(&self) -> &str {
        "http://snomed.info/sct"
    }

    fn version(&self) -> Option<&str> {
        Some("http://snomed.info/sct/900000000000207008/version/20240201")
    }

    fn entries(&self) -> &[CodeEntry] {
        static ENTRIES: std::sync::LazyLock<Vec<CodeEntry>> = std::sync::LazyLock::new(|| {
            let rows = [
                ("14106009", "Cardiac pacemaker"),
                ("72506001", "Implantable defibrillator"),
                ("25510005", "Heart valve prosthesis"),
                ("43252007", "Cochlear prosthesis"),
                ("468410003", "Insulin infusion pump"),
                ("360046005", "Vascular access port"),
                ("304120007", "Total hip replacement prosthesis"),
                ("261323006", "Catheter"),
            ];
            rows.iter()
                .map(|(code, display)| CodeEntry::new(code, display))
                .collect()
        });
        &ENTRIES
    }
}
