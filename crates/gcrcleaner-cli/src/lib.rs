//! # gcrcleaner-cli
//!
//! One-shot command-line interface for the registry cleaner.
//!
//! ```text
//! gcr-cleaner --repo gcr.io/project/image --grace 720h --keep 5
//! ```
//!
//! Exit codes: `0` on success, `1` on any error. Output is human-oriented;
//! machine-readable output is the HTTP surface's job.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::collections::BTreeSet;

use clap::Parser;

/// Deletes stale images from container registries.
#[derive(Debug, Parser)]
#[command(name = "gcr-cleaner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Repository to clean. Repeatable; comma-separated values are split.
    #[arg(long = "repo", value_name = "NAME")]
    pub repos: Vec<String>,

    /// Bearer token used to authenticate against the registry.
    #[arg(long, env = "GCRCLEANER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Also clean every repository nested under the given roots.
    #[arg(long)]
    pub recursive: bool,

    /// Age a manifest must exceed before it is eligible (e.g. "24h").
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    pub grace: std::time::Duration,

    /// Number of deletion candidates to protect, freshest first.
    #[arg(long, default_value_t = 0)]
    pub keep: usize,

    /// Regex deleting manifests where any tag matches.
    #[arg(long = "tag-filter-any", default_value = "")]
    pub tag_filter_any: String,

    /// Regex deleting manifests where every tag matches.
    #[arg(long = "tag-filter-all", default_value = "")]
    pub tag_filter_all: String,

    /// Report deletions without performing them.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Parallel deletions per repository (0 = one per CPU core).
    #[arg(long, default_value_t = 0)]
    pub concurrency: usize,
}

impl Cli {
    /// Splits comma-separated values, trims, deduplicates, and sorts the
    /// repository arguments.
    #[must_use]
    pub fn normalized_repos(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .repos
            .iter()
            .flat_map(|value| value.split(','))
            .map(|repo| repo.trim().to_string())
            .filter(|repo| !repo.is_empty())
            .collect();
        set.into_iter().collect()
    }
}
