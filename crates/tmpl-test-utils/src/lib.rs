//! Shared test utilities for the tmpl workspace.
//!
//! This crate provides standardised fixtures for crate test suites. It is a
//! dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`] - git repositories with committed values files
//! - [`decryptor`] - [`StaticDecryptor`], an in-memory secret decryptor
//! - [`fetcher`] - [`StaticFetcher`], an in-memory remote fetcher

pub mod decryptor;
pub mod fetcher;
pub mod git;

pub use decryptor::StaticDecryptor;
pub use fetcher::StaticFetcher;
