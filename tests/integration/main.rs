//! Integration tests for knowlink
//!
//! Each module drives the public API end to end with stub embedders from
//! `knowlink::test_utils`.

mod cache_tests;
mod fixture;
mod indexing_tests;
mod resolve_tests;
