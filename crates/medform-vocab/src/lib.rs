//! medform-vocab
//!
//! Controlled vocabularies. Pure data, no I/O beyond parsing a JSON table
//! document. Defines the code tables, the registry they live in, and the
//! immutable catalogs forms use to turn codes into labels and codings.

pub mod catalog;
pub mod entry;
pub mod error;
pub mod registry;
pub mod tables;

pub use catalog::{Catalogs, CodeCatalog};
pub use entry::{CodeEntry, CodeLabel};
pub use error::VocabError;
pub use registry::{Vocabulary, VocabularyRegistry};

/// Trait implemented by each built-in code table.
pub trait Table: Send + Sync {
    /// Registry identifier (e.g., "device-status").
    fn id(&self) -> &str;

    /// Code system URI written into stored codings.
    fn system(&self) -> &str;

    /// Code system version, if the table pins one.
    fn version(&self) -> Option<&str> {
        None
    }

    /// The table rows, in display order.
    fn entries(&self) -> &[CodeEntry];

    /// Copy this table into a registrable [`Vocabulary`].
    fn to_vocabulary(&self) -> Vocabulary {
        Vocabulary {
            id: self.id().to_string(),
            system: self.system().to_string(),
            version: self.version().map(str::to_string),
            entries: self.entries().to_vec(),
        }
    }
}

/// Return all built-in tables.
pub fn all_tables() -> Vec<Box<dyn Table>> {
    vec![
        Box::new(tables::device_status::DeviceStatus),
        Box::new(tables::device_kind::DeviceKind),
        Box::new(tables::body_site::BodySite),
        Box::new(tables::observation_interpretation::ObservationInterpretation),
    ]
}

/// Look up a built-in table by ID.
pub fn get_table(id: &str) -> Option<Box<dyn Table>> {
    all_tables().into_iter().find(|t| t.id() == id)
}
