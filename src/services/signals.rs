//! Normalisation of raw ranking signals.
//!
//! Every signal is computed from the entity being scored plus, where noted,
//! caller-supplied query parameters. Malformed inputs degrade to the
//! signal's fallback value instead of failing.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::catalog::entity::GeoPoint;

pub const RELEVANCE_NEUTRAL: f64 = 1.0;
pub const RELEVANCE_MATCHED: f64 = 2.0;
pub const RELEVANCE_UNMATCHED: f64 = 0.1;

pub const MAX_RATING: f64 = 5.0;
pub const EXPERIENCE_CAP_YEARS: u32 = 20;

/// Scores how well an entity's text answers a query.
pub trait RelevanceScorer: Send + Sync {
	fn score(
		&self,
		text: Option<&str>,
		query: &str,
	) -> f64;
}

/// Case-insensitive substring match.
///
/// Stand-in for a real text-search score: 1.0 for an empty query, 2.0 when
/// the text contains the query, 0.1 otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct SubstringRelevance;

impl RelevanceScorer for SubstringRelevance {
	fn score(
		&self,
		text: Option<&str>,
		query: &str,
	) -> f64 {
		if query.is_empty() {
			return RELEVANCE_NEUTRAL;
		}
		match text {
			Some(text) if text.to_lowercase().contains(&query.to_lowercase()) => RELEVANCE_MATCHED,
			_ => RELEVANCE_UNMATCHED,
		}
	}
}

#[derive(Clone)]
pub struct SignalNormalizer {
	relevance: Arc<dyn RelevanceScorer>,
}

impl Default for SignalNormalizer {
	fn default() -> Self {
		Self::new(Arc::new(SubstringRelevance))
	}
}

impl std::fmt::Debug for SignalNormalizer {
	fn fmt(
		&self,
		f: &mut std::fmt::Formatter<'_>,
	) -> std::fmt::Result {
		f.debug_struct("SignalNormalizer").finish_non_exhaustive()
	}
}

impl SignalNormalizer {
	pub fn new(relevance: Arc<dyn RelevanceScorer>) -> Self {
		Self { relevance }
	}

	pub fn relevance(
		&self,
		text: Option<&str>,
		query: Option<&str>,
	) -> f64 {
		self.relevance.score(text, query.unwrap_or_default())
	}

	/// `(cutoff - d) / cutoff` for `d` metres between the two points, 0 when
	/// either point is missing or malformed or `d` reaches the cutoff.
	pub fn distance(
		&self,
		entity: Option<GeoPoint>,
		caller: Option<GeoPoint>,
		cutoff_m: f64,
	) -> f64 {
		let (Some(entity), Some(caller)) = (entity, caller) else {
			return 0.0;
		};
		if !entity.is_finite() || !caller.is_finite() || cutoff_m.is_nan() || cutoff_m <= 0.0 {
			return 0.0;
		}
		let d = entity.distance_to(&caller);
		if d >= cutoff_m {
			return 0.0;
		}
		((cutoff_m - d) / cutoff_m).max(0.0)
	}

	pub fn rating(
		&self,
		rating: f64,
	) -> f64 {
		if !rating.is_finite() {
			return 0.0;
		}
		rating.clamp(0.0, MAX_RATING) / MAX_RATING
	}

	/// `1 / (1 + hours / 24)`. Timestamps in the future count as age 0.
	pub fn freshness(
		&self,
		create_dt: DateTime<Utc>,
		now: DateTime<Utc>,
	) -> f64 {
		let hours = (now - create_dt).num_milliseconds().max(0) as f64 / 3_600_000.0;
		1.0 / (1.0 + hours / 24.0)
	}

	/// `(cap - price) / cap` within the cap, 0 above it.
	pub fn low_cost(
		&self,
		price: f64,
		cap: f64,
	) -> f64 {
		if !price.is_finite() || cap.is_nan() || cap <= 0.0 || price > cap {
			return 0.0;
		}
		((cap - price) / cap).clamp(0.0, 1.0)
	}

	pub fn experience(
		&self,
		years: u32,
	) -> f64 {
		f64::from(years.min(EXPERIENCE_CAP_YEARS)) / f64::from(EXPERIENCE_CAP_YEARS)
	}
}
