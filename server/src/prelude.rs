pub use collabdocs_types::prelude::*;

pub use crate::app::App;

// vim: ts=4
