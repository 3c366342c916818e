mod cli;
mod service;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use memo_sync::config::AppConfig;
use service::{update::Changes, Target};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    AppConfig::validate_scope_flags(cli.local, cli.global)?;
    let target = Target {
        scope: AppConfig::scope_from_flags(cli.local, cli.global),
        user: cli.user,
    };

    match cli.command {
        Commands::Init => service::init::initialize(&target).await,
        Commands::Add {
            title,
            content,
            category,
            priority,
            tags,
        } => service::add::add(&target, title, content, category, priority, tags).await,
        Commands::List { limit, offset } => service::list::list(&target, limit, offset).await,
        Commands::Show { id } => service::show::show(&target, &id).await,
        Commands::Update {
            id,
            title,
            content,
            category,
            priority,
            tags,
        } => {
            let changes = Changes {
                title,
                content,
                category,
                priority,
                tags,
            };
            service::update::update(&target, &id, changes).await
        }
        Commands::Delete { id, force } => service::delete::delete(&target, &id, force).await,
        Commands::Search { query } => service::list::search(&target, &query).await,
        Commands::Category { category } => service::list::category(&target, category).await,
        Commands::Stats => service::stats::stats(&target).await,
        Commands::Watch => service::watch::watch(&target).await,
    }
}

/// 日志输出到 stderr；RUST_LOG 优先，否则默认 warn，-v 提升到 debug
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
