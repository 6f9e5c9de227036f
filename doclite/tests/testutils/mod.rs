//! Test utilities for doclite integration tests
//!
//! Every fixture owns its own storage, so tests stay independent.

#![allow(dead_code)]

pub mod test_fixture;
