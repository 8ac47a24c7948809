//! Integration tests for pxl crates.
//!
//! End-to-end scenarios that cross crate boundaries: operators feeding
//! statistics, color conversion feeding raw streams, compression of
//! converted images, and ownership transfers between handles.
