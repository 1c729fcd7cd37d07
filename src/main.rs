use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use flashcards_review::database::ReviewLedger;
use flashcards_review::export::json::{export_json_to_path, import_json, import_payload};
use flashcards_review::models::due_selector;
use flashcards_review::models::review_action::{ErrorResponse, format_timestamp};
use flashcards_review::{
    Config, DueFilter, Flashcard, NewFlashcard, ReviewRequest, ReviewSession, SqliteStore,
};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

/// Spaced-repetition flashcards with SM-2 scheduling.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Path to the card database (SQLite)
    #[arg(long, env = "FLASHCARDS_DB", default_value = flashcards_review::config::DEFAULT_DATABASE_PATH)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new card
    Add {
        question: String,
        answer: String,
        #[arg(long)]
        subject: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        difficulty: Option<String>,
    },
    /// List the most recently created cards
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Find cards whose question or answer contains the text
    Search { text: String },
    /// Delete a card and its review history
    Delete { id: i64 },
    /// Show cards due for review
    Study {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Include cards scheduled in the future
        #[arg(long)]
        show_snoozed: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Review one card
    Review {
        id: i64,
        action: ActionArg,
        /// Days to postpone, for `snooze`
        #[arg(long)]
        days: Option<i64>,
    },
    /// Read one JSON review request on stdin and print the JSON response
    ReviewJson,
    /// Show the review history of a card
    History { id: i64 },
    /// Export all cards and reviews to a JSON file
    Export { path: PathBuf },
    /// Import cards and reviews from a JSON export
    Import { path: PathBuf },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ActionArg {
    Known,
    Unknown,
    Snooze,
}

impl ActionArg {
    fn token(self) -> &'static str {
        match self {
            ActionArg::Known => "known",
            ActionArg::Unknown => "unknown",
            ActionArg::Snooze => "snooze",
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().init();
    let cli = Cli::parse();
    let config = Config::default().with_database_path(&cli.db);

    match run(&cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("command failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Command, config: &Config) -> flashcards_review::Result<()> {
    let store = config.open_store()?;
    let now = Utc::now();

    match command {
        Command::Add {
            question,
            answer,
            subject,
            tags,
            difficulty,
        } => {
            let mut new_card = NewFlashcard::new(question.as_str(), answer.as_str());
            if let Some(subject) = subject {
                new_card = new_card.with_subject(subject.as_str());
            }
            if let Some(tags) = tags {
                new_card = new_card.with_tags(tags.as_str());
            }
            if let Some(difficulty) = difficulty {
                new_card = new_card.with_difficulty(difficulty.as_str());
            }
            let card = store.add_card(&new_card, now)?;
            println!("Card {} created.", card.id);
        }
        Command::List { limit } => {
            let cards = store.recent_cards(limit.unwrap_or(config.dashboard_limit))?;
            println!("{} of {} cards", cards.len(), store.card_count()?);
            for card in &cards {
                print_card(card);
            }
        }
        Command::Search { text } => {
            let cards = store.search_cards(text)?;
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        Command::Delete { id } => {
            store.delete_card(*id)?;
            println!("Card {} deleted.", id);
        }
        Command::Study {
            subject,
            tag,
            show_snoozed,
            limit,
        } => {
            let filter = DueFilter {
                include_snoozed: *show_snoozed,
                subject: subject.clone(),
                tag: tag.clone(),
                limit: Some(limit.unwrap_or(config.study_limit)),
            };
            let cards = due_selector::select(&store, now, &filter)?;
            let choices = due_selector::filter_choices(&store)?;

            println!("{} card{} to review", cards.len(), plural(cards.len()));
            for card in &cards {
                print_card(card);
            }
            println!();
            println!("Subjects: {}", join(&choices.subjects));
            println!("Tags:     {}", join(&choices.tags));
        }
        Command::Review { id, action, days } => {
            // Same validation order as review-json: card existence before snooze days.
            let request = ReviewRequest::new(*id, action.token(), *days);
            let outcome = ReviewSession::new(&store, &store).submit(&request, now)?;
            if let Some(warning) = &outcome.ledger_warning {
                eprintln!("warning: {}", warning);
            }
            println!("{}", serde_json::to_string_pretty(&outcome.response)?);
        }
        Command::ReviewJson => review_json(&store, now)?,
        Command::History { id } => {
            for record in store.list_for(*id)? {
                println!(
                    "{}  q={}  reps {} -> {}  interval {} -> {}  easiness {:.2} -> {:.2}",
                    format_timestamp(record.reviewed_at),
                    record.quality,
                    record.prior.reps,
                    record.new.reps,
                    record.prior.interval,
                    record.new.interval,
                    record.prior.easiness,
                    record.new.easiness
                );
            }
        }
        Command::Export { path } => {
            export_json_to_path(&store, path, now)?;
            println!("Exported to {}", path.display());
        }
        Command::Import { path } => {
            let payload = import_json(path)?;
            let summary = import_payload(&store, &payload, now)?;
            println!(
                "Imported {} card{} and {} review{}.",
                summary.cards,
                plural(summary.cards),
                summary.reviews,
                plural(summary.reviews)
            );
        }
    }
    Ok(())
}

/// Protocol boundary: every failure becomes a JSON error payload on stdout.
fn review_json(store: &SqliteStore, now: chrono::DateTime<Utc>) -> flashcards_review::Result<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let result = serde_json::from_str::<ReviewRequest>(&input)
        .map_err(|e| {
            flashcards_review::FlashcardError::InvalidParameter(format!(
                "invalid or missing JSON payload: {}",
                e
            ))
        })
        .and_then(|request| ReviewSession::new(store, store).submit(&request, now));

    let body = match result {
        Ok(outcome) => serde_json::to_value(&outcome.response)?,
        Err(e) => {
            if e.is_client_error() {
                log::info!("review rejected: {}", e);
            } else {
                log::error!("review failed: {}", e);
            }
            let mut body = serde_json::to_value(ErrorResponse::from(&e))?;
            body["code"] = e.status_code().into();
            body
        }
    };
    println!("{}", body);
    Ok(())
}

fn print_card(card: &Flashcard) {
    let next = card
        .next_review
        .map(format_timestamp)
        .unwrap_or_else(|| "new".to_string());
    println!(
        "[{}] {}  ({})  reps={} interval={} easiness={:.2} next={}",
        card.id,
        card.question,
        card.subject.as_deref().unwrap_or("-"),
        card.reps,
        card.interval,
        card.easiness,
        next
    );
}

fn join(items: &std::collections::BTreeSet<String>) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
