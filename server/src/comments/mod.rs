//! Comments anchored to document ranges

pub mod handler;

// vim: ts=4
