//! # gcrcleaner-registry
//!
//! Docker-v2 registry transport for the cleaner:
//!
//! - [`name`]: repository name parsing (`host/path`)
//! - [`client`]: the [`RegistryClient`] contract and manifest metadata
//! - [`http`]: reqwest-backed client speaking the Docker-v2 API with the
//!   GCR manifest-listing extension
//! - [`keychain`]: credential resolution (static bearer token, instance
//!   metadata, local docker config)
//! - [`memory`]: in-memory fake with fault injection for tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod http;
pub mod keychain;
pub mod memory;
pub mod name;

pub use client::{ManifestSummary, RegistryClient};
pub use error::{DANGLING_PARENT_MARKER, RegistryError, Result};
pub use http::HttpRegistryClient;
pub use keychain::{ChainKeychain, Credential, DockerConfig, Keychain, MetadataServer, StaticToken};
pub use memory::MemoryRegistry;
pub use name::Repository;
