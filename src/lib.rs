//! Ranking and bounded message retention for the community, consultant and
//! marketplace backend.
//!
//! Route handlers fetch an unscored candidate set, hand it to
//! [`RankingEngine`] and serialise the ordered result. Before a message is
//! persisted, [`RetentionManager`] evicts the oldest messages of its
//! conversation so each conversation stays within its capacity.

pub mod adapters;
pub mod bootstrap;
pub mod common;
pub mod config;
pub mod dependencies;
pub mod domain;
pub mod services;

pub use domain::{
	catalog::{EntityClass, ScorableEntity},
	thread::{ConversationKey, Message, MessageDraft, MAX_MESSAGES_PER_CONVERSATION},
};
pub use services::{
	ranking::{RankingContext, RankingEngine, Scored},
	response::{ServiceError, StoreError},
	retention::{AdmissionMode, RetentionManager},
};
