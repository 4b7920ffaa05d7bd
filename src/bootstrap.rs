use std::sync::Arc;

use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
	adapters::repositories::{message_repository::PgConversationStore, ConversationStore},
	config::Config,
	services::{
		ranking::RankingEngine,
		response::ServiceError,
		retention::RetentionManager,
		signals::SignalNormalizer,
	},
};

pub struct Bootstrap;
impl Bootstrap {
	/// Installs the global tracing subscriber. `RUST_LOG` wins over
	/// `config.log_level`; a second call leaves the first subscriber in place.
	pub fn tracing(config: &Config) {
		let installed = tracing_subscriber::registry()
			.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
			.with(tracing_subscriber::fmt::layer())
			.try_init();
		if installed.is_err() {
			tracing::debug!("tracing subscriber already installed");
		}
	}

	pub fn ranking_engine(config: &Config) -> RankingEngine {
		RankingEngine::new(SignalNormalizer::default(), config.scoring_profile.clone()).with_tie_break(config.tie_break)
	}

	pub fn retention_manager(
		store: Arc<dyn ConversationStore>,
		config: &Config,
	) -> RetentionManager {
		RetentionManager::new(store)
			.with_capacity(config.max_messages_per_conversation)
			.with_mode(config.retention_mode)
			.with_history_limit(config.history_limit)
	}

	/// Retention over PostgreSQL, with the schema migrated first.
	pub async fn postgres_retention_manager(
		pool: PgPool,
		config: &Config,
	) -> Result<RetentionManager, ServiceError> {
		let store = PgConversationStore::new(pool);
		store.migrate().await?;
		Ok(Self::retention_manager(Arc::new(store), config))
	}
}
