//! Test suites for the broker.

pub mod support;
