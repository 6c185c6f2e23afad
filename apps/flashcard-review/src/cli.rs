//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "flashcard-review", version, about = "Spaced repetition review for SystemVerilog and UVM flashcards")]
pub struct Cli {
    /// Learner to act as.
    #[arg(long, global = true, env = "FLASHCARD_USER")]
    pub user: Option<String>,

    /// Database file (overrides the config file).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a card, due immediately.
    Add {
        front: String,
        back: String,
        #[arg(long)]
        topic: Option<String>,
    },
    /// List cards due now.
    Due,
    /// Record a review with a 0-5 quality rating.
    Review {
        card_id: Uuid,
        #[arg(allow_negative_numbers = true)]
        quality: i64,
    },
    /// List all cards.
    List {
        #[arg(long)]
        topic: Option<String>,
    },
    /// Show the interval each rating would give.
    Preview { card_id: Uuid },
    /// Show review statistics.
    Stats,
    /// Delete a card and its history.
    Delete { card_id: Uuid },
    /// Write the effective configuration to the config file.
    InitConfig,
}
