use clap::{Parser, Subcommand};

use memo_types::{Category, MemoId, Priority};

#[derive(Parser)]
#[command(name = "memo")]
#[command(about = "Memo storage with cloud sync and local fallback", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Use local configuration (./.memo-sync)
    #[arg(short, long, global = true)]
    pub local: bool,

    /// Use global configuration (~/.memo-sync)
    #[arg(short, long, global = true)]
    pub global: bool,

    /// Signed-in user for cloud storage (overrides config)
    #[arg(short, long, env = "MEMO_USER", global = true)]
    pub user: Option<String>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Initialize memo configuration (optional, auto-init on first use)")]
    Init,

    #[command(about = "Add a new memo")]
    Add {
        title: String,

        #[arg(short, long, default_value = "")]
        content: String,

        /// bug, feature, idea, note or todo
        #[arg(short = 'k', long, default_value = "note")]
        category: Category,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Tags for the memo (comma-separated, e.g., "ui,urgent")
        #[arg(short = 't', long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    #[command(about = "List memos, most recently updated first")]
    List {
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[arg(long)]
        offset: Option<usize>,
    },

    #[command(about = "Show one memo")]
    Show { id: MemoId },

    #[command(about = "Update a memo (unspecified fields keep their current value)")]
    Update {
        id: MemoId,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        content: Option<String>,

        #[arg(short = 'k', long)]
        category: Option<Category>,

        #[arg(short, long)]
        priority: Option<Priority>,

        /// Replace tags (comma-separated)
        #[arg(short = 't', long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    #[command(about = "Delete a memo")]
    Delete {
        id: MemoId,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Search title, content and tags (case-insensitive)")]
    Search { query: String },

    #[command(about = "List memos in one category")]
    Category { category: Category },

    #[command(about = "Show memo counts")]
    Stats,

    #[command(about = "Print the memo list whenever it changes (cloud storage only)")]
    Watch,
}
