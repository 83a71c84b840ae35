pub mod commands;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod plan;
pub mod settings;
pub mod spec;
pub mod validation;
