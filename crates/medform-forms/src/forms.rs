//! Built-in form definitions.

pub mod implanted_device;
pub mod lab_observation;

use std::sync::Arc;

use crate::error::FormError;
use crate::form::FormDefinition;

/// Every built-in form, built and checked.
pub fn all_forms() -> Result<Vec<Arc<FormDefinition>>, FormError> {
    Ok(vec![
        Arc::new(implanted_device::definition()?),
        Arc::new(lab_observation::definition()?),
    ])
}

/// Built-in form by name.
pub fn get_form(name: &str) -> Result<Option<Arc<FormDefinition>>, FormError> {
    Ok(all_forms()?.into_iter().find(|f| f.name() == name))
}
