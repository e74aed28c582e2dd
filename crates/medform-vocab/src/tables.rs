pub mod body_site;
pub mod device_kind;
pub mod device_status;
pub mod observation_interpretation;
