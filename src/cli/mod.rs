use clap::{Parser, Subcommand};

mod handlers;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start notesearch as a service.
    Daemon {
        /// Address to listen on. Defaults to `listen_addr` from config.
        #[clap(long)]
        addr: Option<String>,
    },
    /// Search notes by meaning
    Search {
        /// What to look for
        query: String,

        /// Only search notes in this folder
        #[clap(short, long)]
        folder: Option<String>,

        /// Minimum similarity [0.0, 1.0]
        #[clap(short, long)]
        threshold: Option<f32>,

        /// Maximum number of results
        #[clap(short, long)]
        limit: Option<usize>,

        /// Don't re-embed stale notes, search only fresh ones
        #[clap(long, default_value = "false")]
        no_regenerate: bool,
    },
    /// Show which notes need their embedding regenerated
    Status {
        /// Only report notes in this folder
        #[clap(short, long)]
        folder: Option<String>,
    },
}
