use std::sync::OnceLock;

use crate::{bootstrap::Bootstrap, config::Config, services::ranking::RankingEngine};

pub fn config() -> &'static Config {
	static CONFIG: OnceLock<Config> = OnceLock::new();
	CONFIG.get_or_init(|| {
		Config::new().unwrap_or_else(|err| {
			tracing::warn!("falling back to default configuration: {}", err);
			Config::default()
		})
	})
}

/// Process-wide ranking engine built from `config()`. Ranking holds no
/// mutable state, so one instance serves every request.
pub fn ranking_engine() -> &'static RankingEngine {
	static ENGINE: OnceLock<RankingEngine> = OnceLock::new();
	ENGINE.get_or_init(|| Bootstrap::ranking_engine(config()))
}
