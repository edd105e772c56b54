use clap::{Parser, Subcommand};

/// notify-sync — keep a user's notifications in sync with the backend
#[derive(Parser)]
#[command(name = "notify-sync", version, about)]
pub struct Cli {
    /// User whose notifications to sync (overrides NOTIFY_USER_ID)
    #[arg(long, global = true)]
    pub user_id: Option<i64>,

    /// Bearer token for the backend (overrides NOTIFY_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Print views as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll and print the view on every change until Ctrl-C
    Watch {
        /// Show the full list instead of the dropdown
        #[arg(long)]
        full_page: bool,
    },
    /// Fetch once and print the notifications
    List {
        /// Truncate like the header dropdown
        #[arg(long)]
        dropdown: bool,
    },
    /// Print the server-side unread count
    Unread,
    /// Mark one notification read
    Read { id: i64 },
    /// Mark every notification read
    ReadAll,
    /// Delete one notification
    Delete { id: i64 },
}
