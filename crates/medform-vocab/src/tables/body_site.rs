use crate::entry::CodeEntry;
use crate::Table;

/// Body sites used for implant locations. Rows carry a German display as
/// the localized label.
pub struct BodySite;

impl Table for BodySite {
    fn id(&self) -> &str {
        "body-site"
    }

    fn system(&self) -> &str {
        "http://snomed.info/sct"
    }

    fn entries(&self) -> &[CodeEntry] {
        static ENTRIES: std::sync::LazyLock<Vec<CodeEntry>> = std::sync::LazyLock::new(|| {
            let rows = [
                ("80891009", "Heart structure", "Herz"),
                ("51185008", "Thoracic structure", "Thorax"),
                ("24136001", "Hip joint structure", "Hüftgelenk"),
                ("72696002", "Knee region structure", "Kniegelenk"),
                ("25342003", "Cochlear structure", "Cochlea"),
                ("113257007", "Structure of cardiovascular system", "Herz-Kreislauf-System"),
                ("818983003", "Abdomen", "Abdomen"),
            ];
            rows.iter()
                .map(|(code, display, de)| CodeEntry::new(code, display).localized(de))
                .collect()
        });
        &ENTRIES
    }
}
