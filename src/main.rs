//! # QueryDesk CLI (`qd`)
//!
//! The `qd` binary runs the query resolution pipeline from the command
//! line: resolve a customer question, record feedback on a delivered
//! answer, and inspect the learning state.
//!
//! ## Usage
//!
//! ```bash
//! qd --config ./config/qd.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qd resolve "<query>" --email <addr>` | Run one query through the pipeline |
//! | `qd feedback <kind> --email <addr> ...` | Record feedback on a delivered answer |
//! | `qd learning status` | Show feedback aggregates and the current threshold |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use querydesk::classifier::TicketCategoryClassifier;
use querydesk::collab::{FileTicketSink, PlainFormatter};
use querydesk::config::{self, Config};
use querydesk::connector::SourceConnector;
use querydesk::connector_jira::JiraConnector;
use querydesk::connector_mindtouch::MindTouchConnector;
use querydesk::embedding::create_embedder;
use querydesk::feedback_store::{FeedbackStore, SqliteFeedbackStore};
use querydesk::learning::ContinuousLearningEngine;
use querydesk::models::FeedbackKind;
use querydesk::orchestrator::{Outcome, RetrievalOrchestrator};
use querydesk::policy::{AdaptiveThreshold, SufficiencyPolicy, ThresholdBounds};
use querydesk::profile::StaticProfileResolver;
use querydesk::search::SemanticSearchEngine;

/// QueryDesk CLI — resolve customer queries from scoped knowledge sources
/// or escalate them to categorized tickets.
#[derive(Parser)]
#[command(
    name = "qd",
    about = "QueryDesk — customer query resolution with scoped retrieval and adaptive escalation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one customer query.
    ///
    /// Searches the configured sources in priority order and prints either
    /// the formatted answer or the created ticket.
    Resolve {
        /// The customer's question.
        query: String,

        /// Customer email address; decides organization and role scoping.
        #[arg(long)]
        email: String,

        /// Session identifier for correlating follow-up feedback.
        #[arg(long, default_value = "cli")]
        session: String,

        /// Print the full resolution report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record feedback on a delivered answer.
    Feedback {
        /// Feedback kind: positive, negative, excellent, needs_improvement.
        kind: String,

        /// Email address of the customer giving feedback.
        #[arg(long)]
        email: String,

        /// The response text the feedback refers to.
        #[arg(long)]
        response: String,

        /// Category of the response being rated (e.g. MNHT, NOC).
        #[arg(long)]
        category: String,

        /// Session identifier, when known.
        #[arg(long)]
        session: Option<String>,
    },

    /// Inspect the learning loop.
    Learning {
        #[command(subcommand)]
        action: LearningAction,
    },
}

#[derive(Subcommand)]
enum LearningAction {
    /// Recompute and print feedback aggregates, trend, and the adaptive
    /// threshold currently in force.
    Status {
        /// Restrict the aggregates to one user's feedback (read-only view).
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Resolve {
            query,
            email,
            session,
            json,
        } => run_resolve(&cfg, &query, &email, &session, json).await,
        Commands::Feedback {
            kind,
            email,
            response,
            category,
            session,
        } => run_feedback(&cfg, &kind, &email, &response, &category, session.as_deref()).await,
        Commands::Learning {
            action: LearningAction::Status { user },
        } => run_learning_status(&cfg, user.as_deref()).await,
    }
}

fn threshold_from(cfg: &Config) -> Arc<AdaptiveThreshold> {
    AdaptiveThreshold::new(
        cfg.retrieval.default_threshold,
        ThresholdBounds {
            floor: cfg.retrieval.threshold_floor,
            ceiling: cfg.retrieval.threshold_ceiling,
        },
    )
}

fn build_connectors(cfg: &Config) -> Result<Vec<Arc<dyn SourceConnector>>> {
    let timeout = cfg.retrieval.connector_timeout_secs;
    let mut connectors: Vec<Arc<dyn SourceConnector>> = Vec::new();
    if let Some(jira) = &cfg.connectors.jira {
        connectors.push(Arc::new(JiraConnector::new(jira.clone(), timeout)?));
    }
    if let Some(mindtouch) = &cfg.connectors.mindtouch {
        connectors.push(Arc::new(MindTouchConnector::new(
            mindtouch.clone(),
            timeout,
        )?));
    }
    if connectors.is_empty() {
        anyhow::bail!("No connectors configured; add [connectors.jira] or [connectors.mindtouch]");
    }
    Ok(connectors)
}

async fn run_resolve(
    cfg: &Config,
    query: &str,
    email: &str,
    session: &str,
    json: bool,
) -> Result<()> {
    let embedder = create_embedder(&cfg.embedding)?;
    let orchestrator = RetrievalOrchestrator::new(
        Arc::new(StaticProfileResolver::new(cfg.profiles.clone())),
        build_connectors(cfg)?,
        SemanticSearchEngine::new(embedder),
        SufficiencyPolicy::new(threshold_from(cfg)),
        TicketCategoryClassifier::new(),
        Box::new(PlainFormatter),
        Arc::new(FileTicketSink::new(cfg.tickets.output_dir.clone())),
        cfg.retrieval.fetch_limit,
        Duration::from_secs(cfg.retrieval.connector_timeout_secs),
    );

    let report = orchestrator.resolve(query, email, session).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for stage in &report.stages {
        println!(
            "  {} [{}]: {} fetched, top score {:.3} vs threshold {:.3}{}",
            stage.connector,
            stage.scope,
            stage.fetched,
            stage.top_score,
            stage.threshold,
            stage
                .error
                .as_deref()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default()
        );
    }
    println!();
    match &report.outcome {
        Outcome::Answered { response, source } => {
            println!("Answered from {}:\n\n{}", source, response);
        }
        Outcome::TicketCreated {
            ticket_id,
            category,
            required_fields,
        } => {
            println!("No sufficient match found. Ticket created: {}", ticket_id);
            println!("Category: {}", category);
            if !required_fields.is_empty() {
                println!("Please provide the following details:");
                for (name, description) in required_fields {
                    println!("  {}: {}", name, description);
                }
            }
        }
    }
    Ok(())
}

async fn run_feedback(
    cfg: &Config,
    kind: &str,
    email: &str,
    response: &str,
    category: &str,
    session: Option<&str>,
) -> Result<()> {
    let kind: FeedbackKind = kind
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("Invalid feedback kind")?;
    let store: Arc<dyn FeedbackStore> =
        Arc::new(SqliteFeedbackStore::open(&cfg.feedback.db_path).await?);
    let engine =
        ContinuousLearningEngine::new(store, threshold_from(cfg), cfg.learning.clone());

    let record = engine
        .record(email, session, response, category, kind)
        .await;
    println!("Feedback recorded: {} ({})", record.id, record.kind.as_str());
    Ok(())
}

async fn run_learning_status(cfg: &Config, user: Option<&str>) -> Result<()> {
    let store: Arc<dyn FeedbackStore> =
        Arc::new(SqliteFeedbackStore::open(&cfg.feedback.db_path).await?);
    let engine =
        ContinuousLearningEngine::new(store, threshold_from(cfg), cfg.learning.clone());

    let state = match user {
        Some(user) => engine.status_for(user).await?,
        None => engine.status().await?,
    };
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
