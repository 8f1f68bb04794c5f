//! Shared fixtures for integration tests.

pub mod ftp_server;
