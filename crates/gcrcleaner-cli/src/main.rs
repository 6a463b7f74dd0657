//! CLI binary entry point.

use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gcrcleaner_cli::Cli;
use gcrcleaner_engine::{Cleaner, RetentionPolicy, TagFilter};
use gcrcleaner_registry::{
    ChainKeychain, DockerConfig, HttpRegistryClient, Keychain, MetadataServer, RegistryClient,
    StaticToken,
};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let repos = cli.normalized_repos();
    if repos.is_empty() {
        bail!("missing --repo");
    }

    let tag_filter = TagFilter::build(&cli.tag_filter_any, &cli.tag_filter_all)?;

    let mut keychain = ChainKeychain::new();
    if let Some(token) = &cli.token {
        keychain = keychain.with(StaticToken::new(token.clone()));
    }
    keychain = keychain
        .with(MetadataServer::new().context("failed to set up metadata keychain")?)
        .with(DockerConfig::new());
    let keychain: Arc<dyn Keychain> = Arc::new(keychain);

    let registry: Arc<dyn RegistryClient> = Arc::new(
        HttpRegistryClient::new(keychain).context("failed to set up registry client")?,
    );
    let cleaner = Cleaner::new(registry, cli.concurrency);

    let since = Utc::now() - chrono::Duration::from_std(cli.grace).context("grace out of range")?;

    let repos = if cli.recursive {
        cleaner
            .list_child_repositories(&repos)
            .await
            .context("failed to list child repositories")?
    } else {
        repos
    };

    if cli.dry_run {
        eprintln!("WARNING: running in dry-run mode - nothing will actually be cleaned!\n");
    }

    println!(
        "Deleting refs since {} on {} repo(s)...\n",
        since.to_rfc3339(),
        repos.len()
    );

    let policy = RetentionPolicy {
        since,
        keep: cli.keep,
        tag_filter,
        dry_run: cli.dry_run,
    };

    let mut failures = 0usize;
    for (i, repo) in repos.iter().enumerate() {
        println!("{repo}");
        match cleaner.clean(repo, &policy).await {
            Ok(refs) if !refs.is_empty() => {
                for reference in refs {
                    println!("  ✓ {reference}");
                }
            }
            Ok(_) => println!("  ✗ no refs were deleted"),
            Err(err) => {
                println!("  ✗ {err}");
                failures += 1;
            }
        }
        if i + 1 != repos.len() {
            println!();
        }
    }

    if failures > 0 {
        bail!("failed to clean {failures} of {} repo(s)", repos.len());
    }
    Ok(())
}
