//! Standalone collabdocs server
//!
//! Configured through environment variables, see [`config::Config`].

mod config;

use std::{process::ExitCode, sync::Arc};
use tracing_subscriber::EnvFilter;

use collabdocs::AppBuilder;
use collabdocs::prelude::*;
use collabdocs_store_adapter_sqlite::StoreAdapterSqlite;

use crate::config::Config;

fn log_filter(level: &str) -> EnvFilter {
	// RUST_LOG wins over the configured level
	EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(level))
		.unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(level: &str) {
	let filter = log_filter(level);

	tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			error!("Cannot listen for Ctrl-C: {}", err);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				error!("Cannot listen for SIGTERM: {}", err);
				std::future::pending::<()>().await;
			}
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		() = ctrl_c => info!("Received Ctrl-C"),
		() = terminate => info!("Received SIGTERM"),
	}
}

async fn run(config: Config) -> CdResult<()> {
	let store = Arc::new(StoreAdapterSqlite::from_dsn(&config.db_dsn).await?);

	let mut builder = AppBuilder::new();
	builder
		.listen(config.listen())
		.cors_origins(config.cors_origins.iter().cloned())
		.max_binary_bytes(config.max_binary_bytes)
		.max_text_bytes(config.max_text_bytes)
		.mailbox_capacity(config.mailbox_capacity)
		.meta_adapter(store.clone())
		.snapshot_adapter(store);

	builder.run(shutdown_signal()).await
}

#[tokio::main]
async fn main() -> ExitCode {
	let config = match Config::from_env() {
		Ok(config) => config,
		Err(err) => {
			init_logging("info");
			error!("FATAL: {}", err);
			return ExitCode::FAILURE;
		}
	};
	init_logging(&config.log_level);

	match run(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("FATAL: {}", err);
			ExitCode::FAILURE
		}
	}
}


// vim: ts=4
