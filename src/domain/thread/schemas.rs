use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConversationKey, MessageDraft};
use crate::services::response::ServiceError;

/// Inbound payload of a send-message request.
#[derive(Debug, Deserialize, Serialize)]
pub struct SendMessage {
	pub sender_id: String,
	#[serde(default)]
	pub receiver_id: Option<String>,
	#[serde(default)]
	pub group_id: Option<String>,
	pub content: String,
	#[serde(default)]
	pub media_url: Option<String>,
}

/// Inbound query of a conversation-history request.
#[derive(Debug, Deserialize, Serialize)]
pub struct HistoryQuery {
	pub user_id: String,
	/// A user id, or a group id when `is_group` is set.
	pub other_id: String,
	#[serde(default)]
	pub is_group: bool,
}

fn parse_id(
	field: &str,
	raw: &str,
) -> Result<Uuid, ServiceError> {
	Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::input(format!("{field} is not a valid id")))
}

fn present(value: &Option<String>) -> Option<&str> {
	value.as_deref().filter(|raw| !raw.trim().is_empty())
}

impl SendMessage {
	/// A group id takes precedence over a receiver id.
	pub fn conversation_key(&self) -> Result<ConversationKey, ServiceError> {
		let sender_id = parse_id("sender_id", &self.sender_id)?;
		match (present(&self.group_id), present(&self.receiver_id)) {
			(Some(group_id), _) => Ok(ConversationKey::group(parse_id("group_id", group_id)?)),
			(None, Some(receiver_id)) => Ok(ConversationKey::direct(sender_id, parse_id("receiver_id", receiver_id)?)),
			(None, None) => Err(ServiceError::input("either receiver_id or group_id required")),
		}
	}

	pub fn into_parts(self) -> Result<(ConversationKey, MessageDraft), ServiceError> {
		let key = self.conversation_key()?;
		if self.content.trim().is_empty() {
			return Err(ServiceError::input("content is required"));
		}
		let draft = MessageDraft {
			sender_id: parse_id("sender_id", &self.sender_id)?,
			content: self.content,
			media_url: self.media_url.filter(|url| !url.is_empty()),
		};
		Ok((key, draft))
	}
}

impl HistoryQuery {
	pub fn conversation_key(&self) -> Result<ConversationKey, ServiceError> {
		let other_id = parse_id("other_id", &self.other_id)?;
		if self.is_group {
			return Ok(ConversationKey::group(other_id));
		}
		Ok(ConversationKey::direct(parse_id("user_id", &self.user_id)?, other_id))
	}
}

#[test]
fn test_send_message_key_derivation() {
	let (alice, bob, group) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

	let jsonified = format!(r#"{{"sender_id":"{alice}","receiver_id":"{bob}","content":"hi"}}"#);
	let (key, draft) = serde_json::from_str::<SendMessage>(&jsonified).unwrap().into_parts().unwrap();
	assert_eq!(key, ConversationKey::direct(bob, alice));
	assert_eq!(draft.sender_id, alice);
	assert_eq!(draft.media_url, None);

	let both = SendMessage {
		sender_id: alice.to_string(),
		receiver_id: Some(bob.to_string()),
		group_id: Some(group.to_string()),
		content: "hello".to_string(),
		media_url: Some(String::new()),
	};
	assert_eq!(both.conversation_key().unwrap(), ConversationKey::group(group));

	let neither = SendMessage {
		sender_id: alice.to_string(),
		receiver_id: Some("".to_string()),
		group_id: None,
		content: "hello".to_string(),
		media_url: None,
	};
	assert!(matches!(neither.conversation_key(), Err(ServiceError::InputError(_))));
}

#[test]
fn test_send_message_rejects_malformed_input() {
	let bob = Uuid::new_v4();
	let bad_sender = SendMessage {
		sender_id: "5f0c9a".to_string(),
		receiver_id: Some(bob.to_string()),
		group_id: None,
		content: "hello".to_string(),
		media_url: None,
	};
	assert!(matches!(bad_sender.into_parts(), Err(ServiceError::InputError(_))));

	let empty = SendMessage {
		sender_id: Uuid::new_v4().to_string(),
		receiver_id: Some(bob.to_string()),
		group_id: None,
		content: "   ".to_string(),
		media_url: None,
	};
	assert!(matches!(empty.into_parts(), Err(ServiceError::InputError(_))));
}

#[test]
fn test_history_query_matches_send_key() {
	let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
	let sent = SendMessage {
		sender_id: alice.to_string(),
		receiver_id: Some(bob.to_string()),
		group_id: None,
		content: "hello".to_string(),
		media_url: None,
	};
	let read = HistoryQuery {
		user_id: bob.to_string(),
		other_id: alice.to_string(),
		is_group: false,
	};
	assert_eq!(sent.conversation_key().unwrap(), read.conversation_key().unwrap());

	let group_read = HistoryQuery {
		user_id: bob.to_string(),
		other_id: alice.to_string(),
		is_group: true,
	};
	assert_eq!(group_read.conversation_key().unwrap(), ConversationKey::group(alice));
}
