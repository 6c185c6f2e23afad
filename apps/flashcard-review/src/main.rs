//! Flashcard Review - SM-2 spaced repetition for SystemVerilog and UVM study cards.

mod auth;
mod cli;
mod config;
mod db;
mod service;

use auth::StaticSession;
use clap::Parser;
use cli::{Cli, Command};
use config::Config;
use db::Database;
use review_scheduler::{Flashcard, ReviewScheduler};
use service::ReviewService;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match &cli.config {
        Some(path) => (Config::load_from(path)?, None),
        None => match Config::load() {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(e) = config_error {
        warn!("ignoring config file, using defaults: {e}");
    }

    if let Command::InitConfig = cli.command {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::config_path().ok_or_else(|| anyhow::anyhow!("no config directory available"))?,
        };
        config.save_to(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    let db = Database::open(&db_path)?;

    let user = cli.user.clone().or_else(|| config.learner.default_user.clone());
    let scheduler = ReviewScheduler::with_system_clock(config.to_algorithm()?);
    let service = ReviewService::new(db, StaticSession::new(user), scheduler);

    run(&service, cli.command)
}

fn run(service: &ReviewService<Database, StaticSession>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Add { front, back, topic } => {
            let card = service.add_card(&front, &back, topic.as_deref())?;
            println!("Added {}", card.id);
        }
        Command::Due => {
            let due = service.due_cards()?;
            if due.is_empty() {
                println!("No cards due.");
            }
            for card in &due {
                print_card(card);
            }
        }
        Command::Review { card_id, quality } => {
            let card = service.submit_review(card_id, quality)?;
            println!(
                "Next review in {} day(s), at {} (ease {:.2}, streak {})",
                card.interval,
                card.next_review_at.format("%Y-%m-%d %H:%M UTC"),
                card.easiness_factor,
                card.repetitions
            );
        }
        Command::List { topic } => {
            for card in &service.cards(topic.as_deref())? {
                print_card(card);
            }
        }
        Command::Preview { card_id } => {
            println!("{}:", service.scheduler().algorithm().name());
            for (quality, interval) in service.preview(card_id)? {
                println!("  {} {:<8} -> {} day(s)", quality, quality.label(), interval);
            }
        }
        Command::Stats => {
            let stats = service.stats()?;
            println!("Cards:          {}", stats.total_cards);
            println!("Due now:        {}", stats.due_now);
            println!("Average ease:   {:.2}", stats.average_easiness);
            println!("Reviews:        {}", stats.total_reviews);
            println!("Retention:      {:.0}%", stats.retention_rate * 100.0);
        }
        Command::Delete { card_id } => {
            service.delete_card(card_id)?;
            println!("Deleted {card_id}");
        }
        Command::InitConfig => {}
    }
    Ok(())
}

fn print_card(card: &Flashcard) {
    let topic = card.topic.as_deref().unwrap_or("-");
    println!(
        "{}  [{}]  due {}  {}",
        card.id,
        topic,
        card.next_review_at.format("%Y-%m-%d %H:%M"),
        card.front
    );
}
