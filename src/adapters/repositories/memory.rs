use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CandidateFilter, CandidateSource, ConversationStore};
use crate::{
	domain::{
		catalog::ScorableEntity,
		thread::{ConversationKey, Message},
	},
	services::response::StoreError,
};

/// Process-local message store.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
	messages: RwLock<Vec<Message>>,
}

impl MemoryConversationStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_messages(messages: Vec<Message>) -> Self {
		Self {
			messages: RwLock::new(messages),
		}
	}

	pub async fn contains(
		&self,
		id: Uuid,
	) -> bool {
		self.messages.read().await.iter().any(|message| message.id == id)
	}
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
	async fn count(
		&self,
		key: &ConversationKey,
	) -> Result<u64, StoreError> {
		let messages = self.messages.read().await;
		Ok(messages.iter().filter(|message| &message.conversation_key == key).count() as u64)
	}

	async fn find_oldest(
		&self,
		key: &ConversationKey,
		limit: u64,
	) -> Result<Vec<Message>, StoreError> {
		let mut matching: Vec<Message> = self.messages.read().await.iter().filter(|message| &message.conversation_key == key).cloned().collect();
		// same order as the SQL store: timestamp, then id
		matching.sort_by_key(|message| (message.create_dt, message.id));
		matching.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
		Ok(matching)
	}

	async fn delete_many(
		&self,
		ids: &[Uuid],
	) -> Result<u64, StoreError> {
		let mut messages = self.messages.write().await;
		let before = messages.len();
		messages.retain(|message| !ids.contains(&message.id));
		Ok((before - messages.len()) as u64)
	}

	async fn insert_one(
		&self,
		message: Message,
	) -> Result<Uuid, StoreError> {
		let id = message.id;
		self.messages.write().await.push(message);
		Ok(id)
	}
}

/// Fixed candidate set, filtered per request.
#[derive(Clone, Debug, Default)]
pub struct MemoryCandidateSource {
	entities: Vec<ScorableEntity>,
}

impl MemoryCandidateSource {
	pub fn new(entities: Vec<ScorableEntity>) -> Self {
		Self { entities }
	}
}

impl CandidateSource for MemoryCandidateSource {
	fn candidates(
		&self,
		filter: &CandidateFilter,
	) -> Result<Vec<ScorableEntity>, StoreError> {
		Ok(self.entities.iter().filter(|entity| filter.matches(entity)).cloned().collect())
	}
}
