pub mod schemas;

use std::{fmt, str::FromStr};

// domain for messaging feature
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::services::response::ServiceError;

/// Stored messages a single conversation may hold.
pub const MAX_MESSAGES_PER_CONVERSATION: u64 = 500;

/// Scope of message storage and retention: a group, or an unordered pair of
/// participants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum ConversationKey {
	Group(Uuid),
	Direct(ParticipantPair),
}

/// Two participants, held in ascending order so that A->B and B->A compare
/// equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ParticipantPair {
	low: Uuid,
	high: Uuid,
}

impl ParticipantPair {
	pub fn new(
		a: Uuid,
		b: Uuid,
	) -> Self {
		if a <= b {
			Self { low: a, high: b }
		} else {
			Self { low: b, high: a }
		}
	}

	pub fn participants(&self) -> (Uuid, Uuid) {
		(self.low, self.high)
	}
}

impl ConversationKey {
	pub fn group(group_id: Uuid) -> Self {
		Self::Group(group_id)
	}

	pub fn direct(
		sender_id: Uuid,
		receiver_id: Uuid,
	) -> Self {
		Self::Direct(ParticipantPair::new(sender_id, receiver_id))
	}
}

impl fmt::Display for ConversationKey {
	fn fmt(
		&self,
		f: &mut fmt::Formatter<'_>,
	) -> fmt::Result {
		match self {
			Self::Group(id) => write!(f, "group:{id}"),
			Self::Direct(pair) => {
				let (low, high) = pair.participants();
				write!(f, "direct:{low}:{high}")
			}
		}
	}
}

impl FromStr for ConversationKey {
	type Err = ServiceError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let parse = |raw: &str| Uuid::parse_str(raw).map_err(|err| ServiceError::input(format!("invalid id `{raw}` in conversation key: {err}")));

		match s.split(':').collect::<Vec<_>>().as_slice() {
			["group", id] => Ok(Self::group(parse(id)?)),
			["direct", a, b] => Ok(Self::direct(parse(a)?, parse(b)?)),
			_ => Err(ServiceError::input(format!("unrecognised conversation key `{s}`"))),
		}
	}
}

impl Serialize for ConversationKey {
	fn serialize<S: Serializer>(
		&self,
		serializer: S,
	) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for ConversationKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Message content as submitted, before it is given an identity.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MessageDraft {
	pub sender_id: Uuid,
	pub content: String,
	pub media_url: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Message {
	pub id: Uuid,
	pub conversation_key: ConversationKey,
	pub sender_id: Uuid,
	pub content: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub media_url: Option<String>,
	pub create_dt: DateTime<Utc>,
}

impl Message {
	pub fn compose(
		conversation_key: ConversationKey,
		draft: MessageDraft,
	) -> Self {
		Self {
			id: Uuid::new_v4(),
			conversation_key,
			sender_id: draft.sender_id,
			content: draft.content,
			media_url: draft.media_url,
			create_dt: Utc::now(),
		}
	}
}
