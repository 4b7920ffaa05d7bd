pub mod memory;
pub mod message_repository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
	domain::{
		catalog::{EntityClass, ScorableEntity},
		thread::{ConversationKey, Message},
	},
	services::response::StoreError,
};

/// Persistence of conversation messages, as consumed by retention.
#[async_trait]
pub trait ConversationStore: Send + Sync {
	async fn count(
		&self,
		key: &ConversationKey,
	) -> Result<u64, StoreError>;

	/// Up to `limit` messages of `key`, oldest first.
	async fn find_oldest(
		&self,
		key: &ConversationKey,
		limit: u64,
	) -> Result<Vec<Message>, StoreError>;

	/// Removes the given messages and reports how many were removed.
	async fn delete_many(
		&self,
		ids: &[Uuid],
	) -> Result<u64, StoreError>;

	/// Stores `message` and returns the id it was stored under.
	async fn insert_one(
		&self,
		message: Message,
	) -> Result<Uuid, StoreError>;

	/// Oldest-first page of a conversation. Same ordering as `find_oldest`.
	async fn history(
		&self,
		key: &ConversationKey,
		limit: u64,
	) -> Result<Vec<Message>, StoreError> {
		self.find_oldest(key, limit).await
	}
}

/// Which stored entities make up a candidate set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateFilter {
	pub class: EntityClass,
	pub include_blocked: bool,
	pub verified_only: bool,
	/// Consultant type, e.g. "Doctor".
	pub consultant_kind: Option<String>,
}

impl CandidateFilter {
	pub fn new(class: EntityClass) -> Self {
		Self {
			class,
			include_blocked: false,
			verified_only: false,
			consultant_kind: None,
		}
	}

	pub fn verified_only(mut self) -> Self {
		self.verified_only = true;
		self
	}

	pub fn of_kind(
		mut self,
		kind: impl Into<String>,
	) -> Self {
		self.consultant_kind = Some(kind.into());
		self
	}

	pub fn matches(
		&self,
		entity: &ScorableEntity,
	) -> bool {
		if entity.class() != self.class || (!self.include_blocked && entity.is_blocked()) {
			return false;
		}
		match entity {
			ScorableEntity::Consultant(consultant) => {
				(!self.verified_only || consultant.verified) && self.consultant_kind.as_deref().map_or(true, |kind| consultant.kind == kind)
			}
			_ => true,
		}
	}
}

/// Supplier of unscored candidate sets.
pub trait CandidateSource {
	fn candidates(
		&self,
		filter: &CandidateFilter,
	) -> Result<Vec<ScorableEntity>, StoreError>;
}
