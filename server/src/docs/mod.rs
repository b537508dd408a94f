//! Document metadata endpoints

pub mod handler;

// vim: ts=4
