// ABOUTME: Test helper module exports
// ABOUTME: Re-exports the axum request builder used across integration tests

#![allow(dead_code)]

pub mod axum_test;
