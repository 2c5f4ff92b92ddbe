//! Tests for the fixture surface

mod cache_tests;
mod tracking_tests;
