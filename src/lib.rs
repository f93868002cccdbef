//! # QueryDesk
//!
//! A customer query resolution pipeline for support teams.
//!
//! QueryDesk takes a customer question, searches scoped knowledge sources
//! in priority order (resolved JIRA issues, then MindTouch documentation),
//! ranks candidates by semantic similarity, and either answers from the
//! best match or escalates to a categorized support ticket. Customer
//! feedback on delivered answers feeds a learning loop that tunes the
//! similarity threshold over time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────┐   ┌────────────┐
//! │ Profile  │──▶│ Connectors │──▶│ Semantic  │──▶│ Sufficiency │
//! │ Resolver │   │ JIRA/MT    │   │ Ranking   │   │ Policy      │
//! └──────────┘   └────────────┘   └───────────┘   └──────┬─────┘
//!                                                        │
//!                                  ┌─────────────────────┤
//!                                  ▼                     ▼
//!                            ┌──────────┐         ┌───────────┐
//!                            │ Formatted │         │  Ticket   │
//!                            │ Response  │         │ Creation  │
//!                            └──────────┘         └───────────┘
//!                                  │
//!                                  ▼
//!                            ┌──────────┐   adjusts   ┌───────────┐
//!                            │ Feedback  │────────────▶│ Adaptive  │
//!                            │ Store     │             │ Threshold │
//!                            └──────────┘             └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qd resolve "database refresh failing" --email alice@amd.com
//! qd feedback positive --email alice@amd.com --response "..." --category MNHT
//! qd learning status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`errors`] | Connector error types |
//! | [`connector`] | Source connector abstraction and scoping |
//! | [`connector_jira`] | Organization-scoped JIRA connector |
//! | [`connector_mindtouch`] | Role-scoped MindTouch connector |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`search`] | Semantic ranking |
//! | [`policy`] | Sufficiency policy and adaptive threshold |
//! | [`classifier`] | Ticket category classification |
//! | [`collab`] | Response formatting and ticket sinks |
//! | [`orchestrator`] | Query resolution state machine |
//! | [`profile`] | Customer profile resolution |
//! | [`feedback_store`] | Feedback persistence |
//! | [`learning`] | Feedback-driven threshold tuning |

pub mod classifier;
pub mod collab;
pub mod config;
pub mod connector;
pub mod connector_jira;
pub mod connector_mindtouch;
pub mod embedding;
pub mod errors;
pub mod feedback_store;
pub mod learning;
pub mod models;
pub mod orchestrator;
pub mod policy;
pub mod profile;
pub mod search;
