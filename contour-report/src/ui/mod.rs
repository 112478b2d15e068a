//! # UI Module
//!
//! Text rendering of a published comparison result.

pub mod cent_meter;
pub mod summary;
