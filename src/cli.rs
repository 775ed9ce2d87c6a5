use clap::{Parser, Subcommand};

/// CloudOps — dashboard API over AWS with an approval workflow
#[derive(Parser)]
#[command(name = "cloudops", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },

    /// Manage approval requests
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// List pending approval requests
    List,
    /// Approve a pending request
    Approve { request_id: String },
    /// Reject a pending request
    Reject { request_id: String },
}
