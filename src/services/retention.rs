//! Bounded message retention per conversation.
//!
//! Before a message is written, the oldest messages of its conversation are
//! evicted so the stored count stays at or under the capacity. Eviction is
//! best-effort: failures while counting, selecting or deleting are logged and
//! the new message is written anyway. Only a failed insert fails the
//! admission.

use std::{
	collections::{hash_map::Entry, HashMap},
	str::FromStr,
	sync::{Arc, Mutex, PoisonError, Weak},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
	adapters::repositories::ConversationStore,
	domain::thread::{ConversationKey, Message, MessageDraft, MAX_MESSAGES_PER_CONVERSATION},
	services::response::ServiceError,
};

/// How concurrent admissions to one conversation are coordinated.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
	/// Admissions on the same key run one at a time within this manager, so
	/// the capacity is never exceeded by writers sharing it.
	#[default]
	Serialized,
	/// Count, evict and insert run unsynchronised. Concurrent senders can
	/// overshoot the capacity until the next admission on the key prunes it.
	BestEffort,
}

impl FromStr for AdmissionMode {
	type Err = ServiceError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"serialized" => Ok(Self::Serialized),
			"best_effort" => Ok(Self::BestEffort),
			other => Err(ServiceError::ConfigError(format!("unknown retention mode `{other}`"))),
		}
	}
}

/// Messages to evict from a conversation holding `count` before one more is
/// admitted.
pub fn eviction_excess(
	count: u64,
	capacity: u64,
) -> u64 {
	if count >= capacity {
		count - capacity + 1
	} else {
		0
	}
}

/// One async mutex per conversation key, dropped once nobody holds it.
#[derive(Debug, Default)]
struct KeyLocks {
	slots: Mutex<HashMap<ConversationKey, Weak<AsyncMutex<()>>>>,
}

impl KeyLocks {
	async fn lock(
		&self,
		key: &ConversationKey,
	) -> OwnedMutexGuard<()> {
		let slot = {
			let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
			let slot = match slots.entry(*key) {
				Entry::Occupied(mut occupied_entry) => match occupied_entry.get().upgrade() {
					Some(slot) => slot,
					None => {
						let slot = Arc::new(AsyncMutex::new(()));
						occupied_entry.insert(Arc::downgrade(&slot));
						slot
					}
				},
				Entry::Vacant(vacant_entry) => {
					let slot = Arc::new(AsyncMutex::new(()));
					vacant_entry.insert(Arc::downgrade(&slot));
					slot
				}
			};
			slots.retain(|_, weak| weak.strong_count() > 0);
			slot
		};
		slot.lock_owned().await
	}

	/// Keys with an admission currently holding or awaiting their lock.
	#[cfg(test)]
	fn active(&self) -> usize {
		self.slots.lock().unwrap_or_else(PoisonError::into_inner).values().filter(|weak| weak.strong_count() > 0).count()
	}
}

pub struct RetentionManager {
	store: Arc<dyn ConversationStore>,
	capacity: u64,
	mode: AdmissionMode,
	history_limit: u64,
	locks: KeyLocks,
}

impl RetentionManager {
	pub fn new(store: Arc<dyn ConversationStore>) -> Self {
		Self {
			store,
			capacity: MAX_MESSAGES_PER_CONVERSATION,
			mode: AdmissionMode::default(),
			history_limit: 100,
			locks: KeyLocks::default(),
		}
	}

	/// Capacities below 1 are raised to 1.
	pub fn with_capacity(
		mut self,
		capacity: u64,
	) -> Self {
		self.capacity = capacity.max(1);
		self
	}

	pub fn with_mode(
		mut self,
		mode: AdmissionMode,
	) -> Self {
		self.mode = mode;
		self
	}

	pub fn with_history_limit(
		mut self,
		history_limit: u64,
	) -> Self {
		self.history_limit = history_limit;
		self
	}

	pub fn capacity(&self) -> u64 {
		self.capacity
	}

	pub fn mode(&self) -> AdmissionMode {
		self.mode
	}

	/// Evicts overflow from `key`, then stores the drafted message.
	///
	/// Returns the committed message, carrying the id the store reported.
	/// Fails only when the insert fails.
	pub async fn admit_message(
		&self,
		key: ConversationKey,
		draft: MessageDraft,
	) -> Result<Message, ServiceError> {
		let _guard = match self.mode {
			AdmissionMode::Serialized => Some(self.locks.lock(&key).await),
			AdmissionMode::BestEffort => None,
		};

		let evicted = self.prune(&key).await;

		let mut message = Message::compose(key, draft);
		message.id = self.store.insert_one(message.clone()).await.map_err(|err| {
			tracing::error!(conversation = %key, evicted, "failed to store message: {}", err);
			err
		})?;

		tracing::debug!(conversation = %key, id = %message.id, evicted, "message admitted");
		Ok(message)
	}

	/// Oldest-first page of a conversation.
	pub async fn history(
		&self,
		key: &ConversationKey,
	) -> Result<Vec<Message>, ServiceError> {
		Ok(self.store.history(key, self.history_limit).await?)
	}

	/// Best-effort removal of the oldest messages so one more fits. Returns
	/// how many were removed.
	async fn prune(
		&self,
		key: &ConversationKey,
	) -> u64 {
		let count = match self.store.count(key).await {
			Ok(count) => count,
			Err(err) => {
				tracing::warn!(conversation = %key, "skipping eviction, count failed: {}", err);
				return 0;
			}
		};

		let excess = eviction_excess(count, self.capacity);
		if excess == 0 {
			return 0;
		}

		let oldest = match self.store.find_oldest(key, excess).await {
			Ok(oldest) => oldest,
			Err(err) => {
				tracing::warn!(conversation = %key, excess, "skipping eviction, lookup failed: {}", err);
				return 0;
			}
		};
		let ids: Vec<Uuid> = oldest.iter().map(|message| message.id).collect();
		if ids.is_empty() {
			return 0;
		}

		match self.store.delete_many(&ids).await {
			Ok(deleted) => {
				if deleted < ids.len() as u64 {
					tracing::warn!(conversation = %key, deleted, requested = ids.len(), "partial eviction");
				}
				deleted
			}
			Err(err) => {
				tracing::warn!(conversation = %key, requested = ids.len(), "eviction failed: {}", err);
				0
			}
		}
	}
}

#[cfg(test)]
mod test {
	use std::sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	};

	use async_trait::async_trait;
	use chrono::{Duration, Utc};
	use tokio::sync::Barrier;
	use uuid::Uuid;

	use super::{eviction_excess, AdmissionMode, RetentionManager};
	use crate::{
		adapters::repositories::{memory::MemoryConversationStore, ConversationStore},
		domain::thread::{ConversationKey, Message, MessageDraft, MAX_MESSAGES_PER_CONVERSATION},
		services::response::{ServiceError, StoreError},
	};

	fn draft(content: &str) -> MessageDraft {
		MessageDraft {
			sender_id: Uuid::new_v4(),
			content: content.to_string(),
			media_url: None,
		}
	}

	/// `n` messages on `key`, one second apart, oldest first.
	fn backlog(
		key: ConversationKey,
		n: usize,
	) -> Vec<Message> {
		let start = Utc::now() - Duration::days(1);
		(0..n)
			.map(|i| {
				let mut message = Message::compose(key, draft(&format!("#{i}")));
				message.create_dt = start + Duration::seconds(i as i64);
				message
			})
			.collect()
	}

	/// Memory store whose individual operations can be made to fail.
	#[derive(Default)]
	struct FlakyStore {
		inner: MemoryConversationStore,
		fail_count: AtomicBool,
		fail_delete: AtomicBool,
		fail_insert: AtomicBool,
		assign_ids: AtomicBool,
	}

	fn unavailable() -> StoreError {
		StoreError::Unavailable("injected".to_string())
	}

	#[async_trait]
	impl ConversationStore for FlakyStore {
		async fn count(
			&self,
			key: &ConversationKey,
		) -> Result<u64, StoreError> {
			if self.fail_count.load(Ordering::SeqCst) {
				return Err(unavailable());
			}
			self.inner.count(key).await
		}
		async fn find_oldest(
			&self,
			key: &ConversationKey,
			limit: u64,
		) -> Result<Vec<Message>, StoreError> {
			self.inner.find_oldest(key, limit).await
		}
		async fn delete_many(
			&self,
			ids: &[Uuid],
		) -> Result<u64, StoreError> {
			if self.fail_delete.load(Ordering::SeqCst) {
				return Err(unavailable());
			}
			self.inner.delete_many(ids).await
		}
		async fn insert_one(
			&self,
			message: Message,
		) -> Result<Uuid, StoreError> {
			if self.fail_insert.load(Ordering::SeqCst) {
				return Err(unavailable());
			}
			let mut message = message;
			if self.assign_ids.load(Ordering::SeqCst) {
				message.id = Uuid::new_v4();
			}
			self.inner.insert_one(message).await
		}
	}

	/// Memory store that holds every admission at a barrier after `count`
	/// and after `find_oldest`, so concurrent admissions all read the same
	/// state before anyone evicts.
	struct GatedStore {
		inner: MemoryConversationStore,
		gate: Barrier,
		gated: AtomicBool,
	}

	impl GatedStore {
		async fn pass(&self) {
			if self.gated.load(Ordering::SeqCst) {
				self.gate.wait().await;
			}
		}
	}

	#[async_trait]
	impl ConversationStore for GatedStore {
		async fn count(
			&self,
			key: &ConversationKey,
		) -> Result<u64, StoreError> {
			let count = self.inner.count(key).await;
			self.pass().await;
			count
		}
		async fn find_oldest(
			&self,
			key: &ConversationKey,
			limit: u64,
		) -> Result<Vec<Message>, StoreError> {
			let oldest = self.inner.find_oldest(key, limit).await;
			self.pass().await;
			oldest
		}
		async fn delete_many(
			&self,
			ids: &[Uuid],
		) -> Result<u64, StoreError> {
			self.inner.delete_many(ids).await
		}
		async fn insert_one(
			&self,
			message: Message,
		) -> Result<Uuid, StoreError> {
			self.inner.insert_one(message).await
		}
	}

	#[test]
	fn test_eviction_excess() {
		assert_eq!(eviction_excess(0, 500), 0);
		assert_eq!(eviction_excess(499, 500), 0);
		assert_eq!(eviction_excess(500, 500), 1);
		assert_eq!(eviction_excess(507, 500), 8);
		assert_eq!(eviction_excess(1, 1), 1);
	}

	#[test]
	fn test_admission_mode_from_str() {
		assert_eq!("serialized".parse::<AdmissionMode>().unwrap(), AdmissionMode::Serialized);
		assert_eq!(" BEST_EFFORT ".parse::<AdmissionMode>().unwrap(), AdmissionMode::BestEffort);
		assert!(matches!("strict".parse::<AdmissionMode>(), Err(ServiceError::ConfigError(_))));
	}

	#[tokio::test]
	async fn test_full_conversation_evicts_single_oldest() {
		'_given: {
			let key = ConversationKey::direct(Uuid::new_v4(), Uuid::new_v4());
			let existing = backlog(key, MAX_MESSAGES_PER_CONVERSATION as usize);
			let oldest_id = existing[0].id;
			let second_id = existing[1].id;
			let store = Arc::new(MemoryConversationStore::with_messages(existing));
			let manager = RetentionManager::new(store.clone());

			'_when: {
				let committed = manager.admit_message(key, draft("new")).await.unwrap();

				assert_eq!(store.count(&key).await.unwrap(), MAX_MESSAGES_PER_CONVERSATION);
				assert!(!store.contains(oldest_id).await);
				assert!(store.contains(second_id).await);
				assert!(store.contains(committed.id).await);
				assert_eq!(committed.conversation_key, key);
			}
		}
	}

	#[tokio::test]
	async fn test_below_capacity_does_not_evict() {
		let key = ConversationKey::group(Uuid::new_v4());
		let existing = backlog(key, 495);
		let oldest_id = existing[0].id;
		let store = Arc::new(MemoryConversationStore::with_messages(existing));
		let manager = RetentionManager::new(store.clone());

		manager.admit_message(key, draft("new")).await.unwrap();

		assert_eq!(store.count(&key).await.unwrap(), 496);
		assert!(store.contains(oldest_id).await);
	}

	#[tokio::test]
	async fn test_overshoot_is_corrected_by_next_admission() {
		let key = ConversationKey::group(Uuid::new_v4());
		let existing = backlog(key, 7);
		let survivors: Vec<Uuid> = existing[3..].iter().map(|m| m.id).collect();
		let store = Arc::new(MemoryConversationStore::with_messages(existing));
		let manager = RetentionManager::new(store.clone()).with_capacity(5);

		manager.admit_message(key, draft("new")).await.unwrap();

		assert_eq!(store.count(&key).await.unwrap(), 5);
		for id in survivors {
			assert!(store.contains(id).await);
		}
	}

	#[tokio::test]
	async fn test_other_conversations_untouched() {
		let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
		let full = ConversationKey::direct(alice, bob);
		let neighbour = ConversationKey::direct(alice, carol);
		let mut existing = backlog(neighbour, 3);
		existing.extend(backlog(full, 3));
		let store = Arc::new(MemoryConversationStore::with_messages(existing));
		let manager = RetentionManager::new(store.clone()).with_capacity(3);

		// sent from the other side of the pair, same conversation
		manager.admit_message(ConversationKey::direct(bob, alice), draft("hi")).await.unwrap();

		assert_eq!(store.count(&full).await.unwrap(), 3);
		assert_eq!(store.count(&neighbour).await.unwrap(), 3);
	}

	#[tokio::test]
	async fn test_eviction_failure_still_admits() {
		let key = ConversationKey::group(Uuid::new_v4());
		let store = Arc::new(FlakyStore {
			inner: MemoryConversationStore::with_messages(backlog(key, 4)),
			..Default::default()
		});
		let manager = RetentionManager::new(store.clone()).with_capacity(4);

		store.fail_delete.store(true, Ordering::SeqCst);
		let committed = manager.admit_message(key, draft("delete fails")).await.unwrap();
		assert!(store.inner.contains(committed.id).await);
		assert_eq!(store.inner.count(&key).await.unwrap(), 5);

		store.fail_delete.store(false, Ordering::SeqCst);
		store.fail_count.store(true, Ordering::SeqCst);
		manager.admit_message(key, draft("count fails")).await.unwrap();
		assert_eq!(store.inner.count(&key).await.unwrap(), 6);

		// next healthy admission prunes back under the cap
		store.fail_count.store(false, Ordering::SeqCst);
		manager.admit_message(key, draft("healthy")).await.unwrap();
		assert_eq!(store.inner.count(&key).await.unwrap(), 4);
	}

	#[tokio::test]
	async fn test_insert_failure_propagates() {
		let key = ConversationKey::group(Uuid::new_v4());
		let store = Arc::new(FlakyStore {
			inner: MemoryConversationStore::with_messages(backlog(key, 2)),
			..Default::default()
		});
		store.fail_insert.store(true, Ordering::SeqCst);
		let manager = RetentionManager::new(store.clone()).with_capacity(2);

		let result = manager.admit_message(key, draft("lost")).await;
		assert!(matches!(result, Err(ServiceError::StoreError(StoreError::Unavailable(_)))));
		// pruning already happened and is not rolled back
		assert_eq!(store.inner.count(&key).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_committed_message_carries_store_id() {
		let key = ConversationKey::group(Uuid::new_v4());
		let store = Arc::new(FlakyStore::default());
		store.assign_ids.store(true, Ordering::SeqCst);
		let manager = RetentionManager::new(store.clone());

		let committed = manager.admit_message(key, draft("renamed")).await.unwrap();

		assert!(store.inner.contains(committed.id).await);
		assert_eq!(manager.history(&key).await.unwrap(), vec![committed]);
	}

	#[tokio::test]
	async fn test_best_effort_overshoot_is_transient() {
		'_given: {
			let key = ConversationKey::group(Uuid::new_v4());
			let store = Arc::new(GatedStore {
				inner: MemoryConversationStore::with_messages(backlog(key, 5)),
				gate: Barrier::new(4),
				gated: AtomicBool::new(true),
			});
			let manager = RetentionManager::new(store.clone()).with_capacity(5).with_mode(AdmissionMode::BestEffort);

			'_when: {
				// all four see 5 stored and pick the same oldest victim
				let burst = (0..4).map(|i| manager.admit_message(key, draft(&format!("racer {i}"))));
				for result in futures::future::join_all(burst).await {
					result.unwrap();
				}
				assert_eq!(store.inner.count(&key).await.unwrap(), 8);

				store.gated.store(false, Ordering::SeqCst);
				manager.admit_message(key, draft("settles")).await.unwrap();
				assert_eq!(store.inner.count(&key).await.unwrap(), 5);
			}
		}
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn test_serialized_admissions_respect_capacity() {
		'_given: {
			let key = ConversationKey::group(Uuid::new_v4());
			let store = Arc::new(MemoryConversationStore::with_messages(backlog(key, 10)));
			let manager = Arc::new(RetentionManager::new(store.clone()).with_capacity(10).with_mode(AdmissionMode::Serialized));

			'_when: {
				let admissions = (0..50).map(|i| {
					let manager = manager.clone();
					tokio::spawn(async move { manager.admit_message(key, draft(&format!("burst {i}"))).await })
				});
				for result in futures::future::join_all(admissions).await {
					result.unwrap().unwrap();
				}

				assert_eq!(store.count(&key).await.unwrap(), 10);
				// lock slots are released once no admission holds them
				assert_eq!(manager.locks.active(), 0);
			}
		}
	}

	#[tokio::test]
	async fn test_history_is_oldest_first_and_capped() {
		let key = ConversationKey::group(Uuid::new_v4());
		let existing = backlog(key, 8);
		let store = Arc::new(MemoryConversationStore::with_messages(existing.clone()));
		let manager = RetentionManager::new(store).with_history_limit(5);

		let history = manager.history(&key).await.unwrap();
		assert_eq!(history, existing[..5].to_vec());
	}
}
