//! Composite scoring and ordering of candidate sets.
//!
//! Each entity class converts its normalised signals into one scalar with a
//! fixed weight vector:
//!
//! ```text
//! post       = 1.0·relevance + 0.3·distance + 0.3·rating + 0.4·freshness
//! consultant =  30·rating + 20·experience + 20·low_cost(fee, 1 000)
//! buy/sell   =  40·rating + 30·low_cost(price, 100 000) + priority
//! rent       =  40·rating + 30·low_cost(price, 5 000)   + priority
//! ```
//!
//! Scores are computed per candidate with no cross-candidate normalisation,
//! then sorted descending. Administrative priority is added as raw points.

use std::{cmp::Ordering, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
	adapters::repositories::{CandidateFilter, CandidateSource},
	domain::catalog::{entity::GeoPoint, EntityClass, ScorableEntity},
	services::{response::ServiceError, signals::SignalNormalizer},
};

/// Query-scoped parameters of one ranking call.
#[derive(Clone, Debug, PartialEq)]
pub struct RankingContext {
	pub query: Option<String>,
	pub caller: Option<GeoPoint>,
	/// Reference instant for freshness, fixed per call so repeated calls
	/// over the same input agree.
	pub now: DateTime<Utc>,
}

impl Default for RankingContext {
	fn default() -> Self {
		Self {
			query: None,
			caller: None,
			now: Utc::now(),
		}
	}
}

impl RankingContext {
	pub fn with_query(
		mut self,
		query: impl Into<String>,
	) -> Self {
		self.query = Some(query.into());
		self
	}

	pub fn with_caller(
		mut self,
		caller: GeoPoint,
	) -> Self {
		self.caller = Some(caller);
		self
	}

	pub fn at(
		mut self,
		now: DateTime<Utc>,
	) -> Self {
		self.now = now;
		self
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostWeights {
	pub relevance: f64,
	pub distance: f64,
	pub rating: f64,
	pub freshness: f64,
	pub priority: f64,
	pub distance_cutoff_m: f64,
}

impl Default for PostWeights {
	fn default() -> Self {
		Self {
			relevance: 1.0,
			distance: 0.3,
			rating: 0.3,
			freshness: 0.4,
			priority: 0.0,
			distance_cutoff_m: 100_000.0,
		}
	}
}

/// Consultants have no position yet, so there is no distance term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsultantWeights {
	pub rating: f64,
	pub experience: f64,
	pub low_cost: f64,
	pub fee_cap: f64,
	pub priority: f64,
}

impl Default for ConsultantWeights {
	fn default() -> Self {
		Self {
			rating: 30.0,
			experience: 20.0,
			low_cost: 20.0,
			fee_cap: 1_000.0,
			priority: 0.0,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListingWeights {
	pub rating: f64,
	pub low_cost: f64,
	pub price_cap: f64,
	pub priority: f64,
}

/// Partial listing weights; absent fields keep the class defaults.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListingOverrides {
	rating: Option<f64>,
	low_cost: Option<f64>,
	price_cap: Option<f64>,
	priority: Option<f64>,
}

impl ListingOverrides {
	fn over(
		self,
		base: ListingWeights,
	) -> ListingWeights {
		ListingWeights {
			rating: self.rating.unwrap_or(base.rating),
			low_cost: self.low_cost.unwrap_or(base.low_cost),
			price_cap: self.price_cap.unwrap_or(base.price_cap),
			priority: self.priority.unwrap_or(base.priority),
		}
	}
}

fn buy_weights<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ListingWeights, D::Error> {
	Ok(ListingOverrides::deserialize(deserializer)?.over(ListingWeights::buy()))
}

fn rent_weights<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ListingWeights, D::Error> {
	Ok(ListingOverrides::deserialize(deserializer)?.over(ListingWeights::rent()))
}

impl ListingWeights {
	pub fn buy() -> Self {
		Self {
			rating: 40.0,
			low_cost: 30.0,
			price_cap: 100_000.0,
			priority: 1.0,
		}
	}

	pub fn rent() -> Self {
		Self {
			price_cap: 5_000.0,
			..Self::buy()
		}
	}
}

/// Weight vectors for every entity class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringProfile {
	pub post: PostWeights,
	pub consultant: ConsultantWeights,
	#[serde(deserialize_with = "buy_weights")]
	pub buy: ListingWeights,
	#[serde(deserialize_with = "rent_weights")]
	pub rent: ListingWeights,
}

impl Default for ScoringProfile {
	fn default() -> Self {
		Self {
			post: PostWeights::default(),
			consultant: ConsultantWeights::default(),
			buy: ListingWeights::buy(),
			rent: ListingWeights::rent(),
		}
	}
}

/// How candidates with equal scores are ordered.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
	/// Keep their relative input order.
	#[default]
	InputOrder,
	/// Ascending entity id, independent of fetch order.
	EntityId,
}

impl FromStr for TieBreak {
	type Err = ServiceError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"input_order" => Ok(Self::InputOrder),
			"entity_id" => Ok(Self::EntityId),
			other => Err(ServiceError::ConfigError(format!("unknown tie break `{other}`"))),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Scored {
	#[serde(flatten)]
	pub entity: ScorableEntity,
	pub score: f64,
}

#[derive(Clone, Debug, Default)]
pub struct RankingEngine {
	normalizer: SignalNormalizer,
	profile: ScoringProfile,
	tie_break: TieBreak,
}

impl RankingEngine {
	pub fn new(
		normalizer: SignalNormalizer,
		profile: ScoringProfile,
	) -> Self {
		Self {
			normalizer,
			profile,
			tie_break: TieBreak::default(),
		}
	}

	pub fn with_tie_break(
		mut self,
		tie_break: TieBreak,
	) -> Self {
		self.tie_break = tie_break;
		self
	}

	pub fn profile(&self) -> &ScoringProfile {
		&self.profile
	}

	/// Composite score of a single entity under its class weights.
	pub fn score(
		&self,
		entity: &ScorableEntity,
		ctx: &RankingContext,
	) -> f64 {
		match entity {
			ScorableEntity::Post(_) => self.post_score(entity, ctx),
			ScorableEntity::Consultant(consultant) => self.consultant_score(entity, consultant.experience_years),
			ScorableEntity::Listing(_) => self.listing_score(entity),
		}
	}

	fn post_score(
		&self,
		post: &ScorableEntity,
		ctx: &RankingContext,
	) -> f64 {
		let w = &self.profile.post;
		let n = &self.normalizer;

		w.relevance * n.relevance(post.text(), ctx.query.as_deref())
			+ w.distance * n.distance(post.position(), ctx.caller, w.distance_cutoff_m)
			+ w.rating * n.rating(post.rating())
			+ w.freshness * n.freshness(post.create_dt(), ctx.now)
			+ w.priority * post.priority() as f64
	}

	fn consultant_score(
		&self,
		consultant: &ScorableEntity,
		experience_years: u32,
	) -> f64 {
		let w = &self.profile.consultant;
		let n = &self.normalizer;

		w.rating * n.rating(consultant.rating())
			+ w.experience * n.experience(experience_years)
			+ w.low_cost * n.low_cost(consultant.price().unwrap_or_default(), w.fee_cap)
			+ w.priority * consultant.priority() as f64
	}

	fn listing_score(
		&self,
		listing: &ScorableEntity,
	) -> f64 {
		let w = match listing.class() {
			EntityClass::RentListing => &self.profile.rent,
			_ => &self.profile.buy,
		};
		let n = &self.normalizer;

		w.rating * n.rating(listing.rating())
			+ w.low_cost * n.low_cost(listing.price().unwrap_or_default(), w.price_cap)
			+ w.priority * listing.priority() as f64
	}

	/// Scores every candidate and orders them by descending score.
	///
	/// Candidates with a nil id or a non-finite score are dropped with a
	/// warning; everything else is returned.
	pub fn rank_scored(
		&self,
		candidates: Vec<ScorableEntity>,
		ctx: &RankingContext,
	) -> Vec<Scored> {
		let total = candidates.len();
		let mut scored: Vec<Scored> = candidates
			.into_iter()
			.filter_map(|entity| {
				if entity.id().is_nil() {
					tracing::warn!(class = ?entity.class(), "excluding candidate without an id from ranking");
					return None;
				}
				let score = self.score(&entity, ctx);
				if !score.is_finite() {
					tracing::warn!(id = %entity.id(), class = ?entity.class(), "excluding candidate with non-finite score {}", score);
					return None;
				}
				Some(Scored { entity, score })
			})
			.collect();

		// stable: equal scores keep input order unless an id tie-break is set
		scored.sort_by(|a, b| {
			let by_score = b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal);
			match self.tie_break {
				TieBreak::InputOrder => by_score,
				TieBreak::EntityId => by_score.then_with(|| a.entity.id().cmp(&b.entity.id())),
			}
		});

		tracing::debug!(candidates = total, ranked = scored.len(), "ranked candidate set");
		scored
	}

	pub fn rank(
		&self,
		candidates: Vec<ScorableEntity>,
		ctx: &RankingContext,
	) -> Vec<ScorableEntity> {
		self.rank_scored(candidates, ctx).into_iter().map(|scored| scored.entity).collect()
	}

	/// Fetches the candidate set matching `filter` and ranks it.
	pub fn rank_from<S: CandidateSource + ?Sized>(
		&self,
		source: &S,
		filter: &CandidateFilter,
		ctx: &RankingContext,
	) -> Result<Vec<Scored>, ServiceError> {
		let candidates = source.candidates(filter)?;
		Ok(self.rank_scored(candidates, ctx))
	}
}
