use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod notes;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::AppFactory;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config = AppFactory::create_config()?;

    match args.command {
        cli::Command::Status { folder } => {
            // no provider needed, so a missing api key is fine here
            let store = AppFactory::create_store(&config)?;
            cli::handle_status(folder, store.as_ref(), config.semantic_search.dimensions)
        }

        cli::Command::Search {
            query,
            folder,
            threshold,
            limit,
            no_regenerate,
        } => {
            let app = AppFactory::create_app(&config)?;
            let args = cli::SearchArgs {
                query,
                folder,
                threshold,
                limit,
                no_regenerate,
            };

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(cli::handle_search(args, &app))
        }

        cli::Command::Daemon { addr } => {
            let app = AppFactory::create_app(&config)?;
            let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            web::start_daemon(app, &addr)
        }
    }
}
