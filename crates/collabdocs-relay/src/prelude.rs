pub use collabdocs_types::prelude::*;

// vim: ts=4
