use crate::entry::CodeEntry;
use crate::Table;

/// Device record status: whether the device is still in use.
pub struct DeviceStatus;

impl Table for DeviceStatus {
    fn id(&self) -> &str {
        "device-status"
    }

    fn system(&self) -> &str {
        "http://hl7.org/fhir/device-status"
    }

    fn entries(&self) -> &[CodeEntry] {
        static ENTRIES: std::sync::LazyLock<Vec<CodeEntry>> = std::sync::LazyLock::new(|| {
            vec![
                CodeEntry::new("active", "Active"),
                CodeEntry::new("inactive", "Inactive"),
                CodeEntry::new("entered-in-error", "Entered in Error"),
            ]
        });
        &ENTRIES
    }
}
