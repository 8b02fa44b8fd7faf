// ABOUTME: Command-line definitions for the portal-chat binary
// ABOUTME: One subcommand runs the service, the rest drive the chat core against it

use clap::{Parser, Subcommand};

/// portal-chat - one-to-one chat service and client
#[derive(Parser, Debug)]
#[command(name = "portal-chat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Service URL for client commands (overrides client.base_url)
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat message service
    Serve,

    /// Show which participant the configured token belongs to
    Whoami,

    /// List conversations of the current participant
    Conversations,

    /// Open the conversation with a participant and print its timeline
    Open {
        counterpart: String,

        /// Acknowledge unread messages addressed to you
        #[arg(long)]
        mark_read: bool,
    },

    /// Send a text message
    Send { counterpart: String, text: String },

    /// Send the interview workflow signal (superadmin only)
    Signal {
        counterpart: String,

        /// Label shown on the counterpart's control
        #[arg(long, default_value = "")]
        message: String,
    },

    /// Print the locally persisted interview capability
    Capability,
}
