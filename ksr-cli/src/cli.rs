use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ksr")]
#[command(about = "Ingest Kickstarter projects from the GraphQL endpoint into a local JSON store")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to <config dir>/ksr/config.toml)
    #[arg(short, long, global = true, env = "KSR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Proxy URL for all requests (overrides the configuration file)
    #[arg(long, global = true, env = "KSR_PROXY")]
    pub proxy: Option<String>,

    /// Proxy username
    #[arg(long, global = true, requires = "proxy")]
    pub proxy_username: Option<String>,

    /// Proxy password
    #[arg(long, global = true, requires = "proxy")]
    pub proxy_password: Option<String>,
}

/// Overrides shared by the paginated commands.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct PageOptions {
    /// Maximum number of pages to fetch (0 for no limit)
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Number of projects merged per store write
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// GraphQL document to run instead of the built-in query
    #[arg(long, value_name = "FILE")]
    pub query: Option<PathBuf>,

    /// Cursor to resume from
    #[arg(long)]
    pub cursor: Option<String>,

    /// Lower bound of the pause between pages, in milliseconds
    #[arg(long)]
    pub min_delay_ms: Option<u64>,

    /// Upper bound of the pause between pages, in milliseconds
    #[arg(long)]
    pub max_delay_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walk the discovery listing and merge every project into the store
    Scrape {
        #[command(flatten)]
        pages: PageOptions,
    },

    /// Fetch newest projects until one already in the store is seen
    Update {
        #[command(flatten)]
        pages: PageOptions,
    },

    /// Add creator history and collaborators to stored projects
    Enrich {
        /// Enrich at most this many projects
        #[arg(long)]
        limit: Option<usize>,

        /// Save after this many enrichments
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Write launched projects whose deadline has not passed to a separate file
    FilterActive {
        /// Output file (defaults to storage.active_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the currencies found in the store
    Currencies,

    /// Derive a fresh session and save it
    Auth,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_scrape_overrides() {
        let args = Args::parse_from([
            "ksr",
            "-v",
            "scrape",
            "--max-pages",
            "5",
            "--batch-size",
            "10",
        ]);
        assert!(args.verbose);
        match args.command {
            Commands::Scrape { pages } => {
                assert_eq!(pages.max_pages, Some(5));
                assert_eq!(pages.batch_size, Some(10));
                assert!(pages.query.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
