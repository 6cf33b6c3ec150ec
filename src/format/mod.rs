//! File formats the crate reads and writes.

pub mod collada;
