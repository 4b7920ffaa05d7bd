use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A (longitude, latitude) position in degrees.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct GeoPoint {
	pub longitude: f64,
	pub latitude: f64,
}

impl GeoPoint {
	pub fn new(
		longitude: f64,
		latitude: f64,
	) -> Self {
		Self { longitude, latitude }
	}

	pub fn is_finite(&self) -> bool {
		self.longitude.is_finite() && self.latitude.is_finite()
	}

	/// Great-circle distance to `other` in metres.
	pub fn distance_to(
		&self,
		other: &GeoPoint,
	) -> f64 {
		crate::common::geo::distance(self.latitude, self.longitude, other.latitude, other.longitude)
	}
}

/// Community feed post.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Post {
	pub id: Uuid,
	pub author_id: Uuid,
	#[serde(default)]
	pub author_name: String,
	/// Cached rating of the author, in [0, 5].
	#[serde(default)]
	pub rating: f64,
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub media_url: Option<String>,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub location: Option<GeoPoint>,
	#[serde(default)]
	pub likes_count: i64,
	#[serde(default)]
	pub priority: i64,
	pub create_dt: DateTime<Utc>,
	pub update_dt: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Consultant {
	pub id: Uuid,
	pub name: String,
	/// e.g. "Doctor", "Government Agent"
	#[serde(default)]
	pub kind: String,
	#[serde(default)]
	pub experience_years: u32,
	#[serde(default)]
	pub consultation_fee: f64,
	#[serde(default)]
	pub rating: f64,
	#[serde(default)]
	pub review_count: u32,
	#[serde(default)]
	pub verified: bool,
	#[serde(default)]
	pub is_blocked: bool,
	#[serde(default)]
	pub priority: i64,
	pub create_dt: DateTime<Utc>,
	pub update_dt: DateTime<Utc>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
	#[default]
	Sell,
	Buy,
	Rent,
}

/// Marketplace listing.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Listing {
	pub id: Uuid,
	pub kind: ListingKind,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	pub price: f64,
	#[serde(default)]
	pub location: Option<GeoPoint>,
	#[serde(default)]
	pub owner_id: Uuid,
	#[serde(default)]
	pub rating: f64,
	#[serde(default)]
	pub review_count: u32,
	/// Admin-settable boost, added to the score as raw points.
	#[serde(default)]
	pub priority: i64,
	#[serde(default)]
	pub is_sponsored: bool,
	#[serde(default)]
	pub is_blocked: bool,
	pub create_dt: DateTime<Utc>,
	pub update_dt: DateTime<Utc>,
}
