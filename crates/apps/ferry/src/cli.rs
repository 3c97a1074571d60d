use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ferry",
    version,
    about = "One-way Exchange to Gmail mail mirror",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a fast incremental pass (the scheduled default)
    Fast {
        /// Stop after this many imports across all folders
        #[arg(long)]
        limit: Option<usize>,

        /// Report what would be imported without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a deep pass over a wider window, ignoring the watermark
    Deep {
        /// Stop after this many imports across all folders
        #[arg(long)]
        limit: Option<usize>,

        /// Report what would be imported without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a capped test pass; dry-run unless --import is given
    Test {
        /// Item ceiling shared across folders (default: TEST_LIMIT)
        #[arg(long)]
        limit: Option<usize>,

        /// Actually import instead of the default dry-run
        #[arg(long)]
        import: bool,
    },

    /// Run the interactive Gmail OAuth flow and store the token
    Auth {
        /// Clear stored tokens instead of authenticating
        #[arg(long)]
        logout: bool,
    },

    /// List folders in the Exchange mailbox
    Folders,

    /// Show watermarks, dedup state, and destination label counts
    Status,
}
