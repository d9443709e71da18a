// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom policy server binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use loom_policy_server::{create_router, AppState, LivenessFile, PolicyService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod version;

/// Loom policy server - handle-addressed policy decisions over HTTP.
#[derive(Parser, Debug)]
#[command(name = "loom-policy-server", about = "Loom policy decision server", version)]
struct Args {
	/// Listening port, overrides configuration
	#[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
	port: Option<u16>,

	/// TOML configuration file (default: /etc/loom/policy-server.toml)
	#[arg(long)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let mut config = match &args.config {
		Some(path) => loom_policy_config::load_config_with_file(path)?,
		None => loom_policy_config::load_config()?,
	};
	if let Some(port) = args.port {
		config.http.port = port;
	}

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		connection_config = %config.policy.connection_config_path.display(),
		"starting loom-policy-server"
	);

	let service = Arc::new(PolicyService::new(&config));

	if config.policy.init_default_enforcer {
		match service.init_default_enforcer().await {
			Ok(handle) => tracing::info!(handle, "default enforcer ready"),
			Err(e) => tracing::warn!(error = %e, "failed to initialise default enforcer"),
		}
	}

	let app = create_router(AppState::new(Arc::clone(&service)));
	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr).await?;
	let mut signals = signals::ShutdownSignals::install()?;
	let liveness = LivenessFile::create(&config.policy.liveness_file)?;
	tracing::info!(addr = %addr, "listening");

	let shutdown = CancellationToken::new();
	let server = axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
	let mut serving = tokio::spawn(async move { server.await });

	tokio::select! {
		result = &mut serving => {
			if let Err(e) = liveness.remove() {
				tracing::error!(error = %e, "failed to remove liveness file");
			}
			result??;
			return Ok(());
		}
		signal = signals.recv() => {
			tracing::info!(signal, "shutdown signal received, draining requests");
		}
	}

	if let Err(e) = liveness.remove() {
		tracing::error!(error = %e, "failed to remove liveness file");
	}
	shutdown.cancel();

	let grace = config.policy.shutdown_grace;
	match tokio::time::timeout(grace, serving).await {
		Ok(result) => result??,
		Err(_) => {
			tracing::error!(grace_secs = grace.as_secs(), "graceful shutdown timed out, forcing exit");
			return Err("graceful shutdown timed out".into());
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}

mod signals {
	use std::io;

	#[cfg(unix)]
	use tokio::signal::unix::{signal, Signal, SignalKind};

	/// Ctrl-C, plus SIGTERM, SIGHUP and SIGQUIT on unix.
	pub struct ShutdownSignals {
		#[cfg(unix)]
		terminate: Signal,
		#[cfg(unix)]
		hangup: Signal,
		#[cfg(unix)]
		quit: Signal,
	}

	impl ShutdownSignals {
		/// Installs the handlers up front so a failure surfaces before serving.
		pub fn install() -> io::Result<Self> {
			Ok(Self {
				#[cfg(unix)]
				terminate: signal(SignalKind::terminate())?,
				#[cfg(unix)]
				hangup: signal(SignalKind::hangup())?,
				#[cfg(unix)]
				quit: signal(SignalKind::quit())?,
			})
		}

		/// Resolves with the name of the first signal received.
		#[cfg(unix)]
		pub async fn recv(&mut self) -> &'static str {
			tokio::select! {
				_ = tokio::signal::ctrl_c() => "SIGINT",
				_ = self.terminate.recv() => "SIGTERM",
				_ = self.hangup.recv() => "SIGHUP",
				_ = self.quit.recv() => "SIGQUIT",
			}
		}

		#[cfg(not(unix))]
		pub async fn recv(&mut self) -> &'static str {
			let _ = tokio::signal::ctrl_c().await;
			"ctrl-c"
		}
	}
}
