use thiserror::Error;

/// Failures reported by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration failed: {0}")]
	Migration(String),
	#[error("store unavailable: {0}")]
	Unavailable(String),
	#[error("corrupt record: {0}")]
	Corrupt(String),
}

impl From<sqlx::migrate::MigrateError> for StoreError {
	fn from(value: sqlx::migrate::MigrateError) -> Self {
		StoreError::Migration(value.to_string())
	}
}

#[derive(Debug, Error)]
pub enum ServiceError {
	/// A structurally required identifier or payload field could not be
	/// interpreted.
	#[error("invalid input: {0}")]
	InputError(String),
	#[error(transparent)]
	StoreError(#[from] StoreError),
	#[error("configuration error: {0}")]
	ConfigError(String),
}

impl ServiceError {
	pub(crate) fn input(message: impl Into<String>) -> Self {
		ServiceError::InputError(message.into())
	}
}
