//! Integration tests for the sync engine
//!
//! These use wiremock to stand in for source sites (and the render service)
//! and exercise full runs end-to-end against a real on-disk catalog.

mod sync_tests;
