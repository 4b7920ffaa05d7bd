use std::str::FromStr;

use crate::{
	domain::thread::MAX_MESSAGES_PER_CONVERSATION,
	services::{
		ranking::{ScoringProfile, TieBreak},
		response::ServiceError,
		retention::AdmissionMode,
	},
};

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
	/// Which events we want to log, unless RUST_LOG says otherwise
	pub log_level: String,

	/// Only read by callers that build their own connection pool
	pub database_url: Option<String>,

	pub max_messages_per_conversation: u64,
	pub retention_mode: AdmissionMode,
	pub history_limit: u64,

	pub tie_break: TieBreak,
	pub scoring_profile: ScoringProfile,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			log_level: "info".to_string(),
			database_url: None,
			max_messages_per_conversation: MAX_MESSAGES_PER_CONVERSATION,
			retention_mode: AdmissionMode::default(),
			history_limit: 100,
			tie_break: TieBreak::default(),
			scoring_profile: ScoringProfile::default(),
		}
	}
}

fn parse_or<T: FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &str,
	default: T,
) -> Result<T, ServiceError>
where
	T::Err: std::fmt::Display,
{
	match lookup(name) {
		None => Ok(default),
		Some(raw) => raw.trim().parse().map_err(|err| ServiceError::ConfigError(format!("{name}: {err}"))),
	}
}

impl Config {
	/// Reads the process environment, after loading `.env` if there is one.
	pub fn new() -> Result<Config, ServiceError> {
		dotenv::dotenv().ok();
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ServiceError> {
		let defaults = Config::default();

		let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);
		let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());

		let max_messages_per_conversation = parse_or(&lookup, "MAX_MESSAGES_PER_CONVERSATION", defaults.max_messages_per_conversation)?;
		if max_messages_per_conversation == 0 {
			return Err(ServiceError::ConfigError("MAX_MESSAGES_PER_CONVERSATION must be at least 1".to_string()));
		}
		let retention_mode = parse_or(&lookup, "RETENTION_MODE", defaults.retention_mode)?;
		let history_limit = parse_or(&lookup, "HISTORY_LIMIT", defaults.history_limit)?;
		let tie_break = parse_or(&lookup, "RANKING_TIE_BREAK", defaults.tie_break)?;

		let scoring_profile = match lookup("SCORING_PROFILE") {
			None => defaults.scoring_profile,
			Some(raw) => serde_json::from_str(&raw).map_err(|err| ServiceError::ConfigError(format!("SCORING_PROFILE: {err}")))?,
		};

		Ok(Config {
			log_level,
			database_url,
			max_messages_per_conversation,
			retention_mode,
			history_limit,
			tie_break,
			scoring_profile,
		})
	}
}
