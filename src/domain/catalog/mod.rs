pub mod entity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use self::entity::{Consultant, GeoPoint, Listing, ListingKind, Post};

/// Weight-vector class an entity is scored under.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
	Post,
	Consultant,
	BuyListing,
	RentListing,
}

/// Anything the ranking engine can order.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ScorableEntity {
	Post(Post),
	Consultant(Consultant),
	Listing(Listing),
}

impl ScorableEntity {
	pub fn id(&self) -> Uuid {
		match self {
			Self::Post(post) => post.id,
			Self::Consultant(consultant) => consultant.id,
			Self::Listing(listing) => listing.id,
		}
	}

	pub fn class(&self) -> EntityClass {
		match self {
			Self::Post(_) => EntityClass::Post,
			Self::Consultant(_) => EntityClass::Consultant,
			// sale listings are scored like buy listings
			Self::Listing(listing) => match listing.kind {
				ListingKind::Buy | ListingKind::Sell => EntityClass::BuyListing,
				ListingKind::Rent => EntityClass::RentListing,
			},
		}
	}

	pub fn text(&self) -> Option<&str> {
		match self {
			Self::Post(post) => post.content.as_deref(),
			Self::Consultant(consultant) => Some(consultant.name.as_str()),
			Self::Listing(listing) => listing.description.as_deref().or(Some(listing.name.as_str())),
		}
	}

	pub fn position(&self) -> Option<GeoPoint> {
		match self {
			Self::Post(post) => post.location,
			// consultants carry an address string only
			Self::Consultant(_) => None,
			Self::Listing(listing) => listing.location,
		}
	}

	/// Rating in effect for scoring: 0 when nobody has reviewed the entity yet.
	pub fn rating(&self) -> f64 {
		match self {
			Self::Post(post) => post.rating,
			Self::Consultant(c) if c.review_count == 0 => 0.0,
			Self::Consultant(c) => c.rating,
			Self::Listing(l) if l.review_count == 0 => 0.0,
			Self::Listing(l) => l.rating,
		}
	}

	pub fn priority(&self) -> i64 {
		match self {
			Self::Post(post) => post.priority,
			Self::Consultant(consultant) => consultant.priority,
			Self::Listing(listing) => listing.priority,
		}
	}

	/// Price or fee feeding the low-cost signal.
	pub fn price(&self) -> Option<f64> {
		match self {
			Self::Post(_) => None,
			Self::Consultant(consultant) => Some(consultant.consultation_fee),
			Self::Listing(listing) => Some(listing.price),
		}
	}

	pub fn create_dt(&self) -> DateTime<Utc> {
		match self {
			Self::Post(post) => post.create_dt,
			Self::Consultant(consultant) => consultant.create_dt,
			Self::Listing(listing) => listing.create_dt,
		}
	}

	pub fn is_blocked(&self) -> bool {
		match self {
			Self::Post(_) => false,
			Self::Consultant(consultant) => consultant.is_blocked,
			Self::Listing(listing) => listing.is_blocked,
		}
	}
}

impl From<Post> for ScorableEntity {
	fn from(value: Post) -> Self {
		ScorableEntity::Post(value)
	}
}

impl From<Consultant> for ScorableEntity {
	fn from(value: Consultant) -> Self {
		ScorableEntity::Consultant(value)
	}
}

impl From<Listing> for ScorableEntity {
	fn from(value: Listing) -> Self {
		ScorableEntity::Listing(value)
	}
}
