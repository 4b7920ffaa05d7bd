use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, FromRow};
use uuid::Uuid;

use super::ConversationStore;
use crate::{
	domain::thread::{ConversationKey, Message},
	services::response::StoreError,
};

/// `ConversationStore` over the `messages` table.
///
/// The pool is owned by the caller; this type only issues queries on it.
#[derive(Clone, Debug)]
pub struct PgConversationStore {
	pool: PgPool,
}

#[derive(Debug, FromRow)]
struct MessageRow {
	id: Uuid,
	conversation_key: String,
	sender_id: Uuid,
	content: String,
	media_url: Option<String>,
	create_dt: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
	type Error = StoreError;
	fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
		let conversation_key = row
			.conversation_key
			.parse::<ConversationKey>()
			.map_err(|err| StoreError::Corrupt(format!("message {}: {}", row.id, err)))?;
		Ok(Message {
			id: row.id,
			conversation_key,
			sender_id: row.sender_id,
			content: row.content,
			media_url: row.media_url,
			create_dt: row.create_dt,
		})
	}
}

fn sql_limit(limit: u64) -> i64 {
	i64::try_from(limit).unwrap_or(i64::MAX)
}

impl PgConversationStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Applies the bundled schema migrations.
	pub async fn migrate(&self) -> Result<(), StoreError> {
		sqlx::migrate!("./migrations").run(&self.pool).await?;
		Ok(())
	}

	async fn oldest_first(
		&self,
		key: &ConversationKey,
		limit: u64,
	) -> Result<Vec<Message>, StoreError> {
		let rows = sqlx::query_as::<_, MessageRow>(
			"SELECT id, conversation_key, sender_id, content, media_url, create_dt
			FROM messages
			WHERE conversation_key = $1
			ORDER BY create_dt ASC, id ASC
			LIMIT $2",
		)
		.bind(key.to_string())
		.bind(sql_limit(limit))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Message::try_from).collect()
	}
}

#[async_trait]
impl ConversationStore for PgConversationStore {
	async fn count(
		&self,
		key: &ConversationKey,
	) -> Result<u64, StoreError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_key = $1")
			.bind(key.to_string())
			.fetch_one(&self.pool)
			.await?;
		Ok(u64::try_from(count).unwrap_or_default())
	}

	async fn find_oldest(
		&self,
		key: &ConversationKey,
		limit: u64,
	) -> Result<Vec<Message>, StoreError> {
		self.oldest_first(key, limit).await
	}

	async fn delete_many(
		&self,
		ids: &[Uuid],
	) -> Result<u64, StoreError> {
		if ids.is_empty() {
			return Ok(0);
		}
		let result = sqlx::query("DELETE FROM messages WHERE id = ANY($1)").bind(ids.to_vec()).execute(&self.pool).await?;
		Ok(result.rows_affected())
	}

	async fn insert_one(
		&self,
		message: Message,
	) -> Result<Uuid, StoreError> {
		sqlx::query(
			"INSERT INTO messages (id, conversation_key, sender_id, content, media_url, create_dt)
			VALUES ($1, $2, $3, $4, $5, $6)",
		)
		.bind(message.id)
		.bind(message.conversation_key.to_string())
		.bind(message.sender_id)
		.bind(&message.content)
		.bind(&message.media_url)
		.bind(message.create_dt)
		.execute(&self.pool)
		.await?;
		Ok(message.id)
	}
}

#[cfg(test)]
mod test {
	use chrono::Utc;
	use uuid::Uuid;

	use super::{sql_limit, MessageRow};
	use crate::{
		domain::thread::{ConversationKey, Message},
		services::response::StoreError,
	};

	#[test]
	fn test_row_mapping() {
		let key = ConversationKey::direct(Uuid::new_v4(), Uuid::new_v4());
		let row = MessageRow {
			id: Uuid::new_v4(),
			conversation_key: key.to_string(),
			sender_id: Uuid::new_v4(),
			content: "Is the tiller still available?".to_string(),
			media_url: Some("https://cdn.example/tiller.jpg".to_string()),
			create_dt: Utc::now(),
		};
		let message = Message::try_from(row).unwrap();
		assert_eq!(message.conversation_key, key);
		assert_eq!(message.media_url.as_deref(), Some("https://cdn.example/tiller.jpg"));
	}

	#[test]
	fn test_corrupt_row() {
		let row = MessageRow {
			id: Uuid::new_v4(),
			conversation_key: "room-17".to_string(),
			sender_id: Uuid::new_v4(),
			content: String::new(),
			media_url: None,
			create_dt: Utc::now(),
		};
		assert!(matches!(Message::try_from(row), Err(StoreError::Corrupt(_))));
	}

	#[test]
	fn test_sql_limit_saturates() {
		assert_eq!(sql_limit(500), 500);
		assert_eq!(sql_limit(u64::MAX), i64::MAX);
	}
}
