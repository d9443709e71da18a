// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-supplied deadlines for adapter I/O.
//!
//! A request handler runs its work inside [`scope`]. Every adapter call made
//! from that work is then bounded by whichever comes first: the caller's
//! deadline or the server's own I/O timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

tokio::task_local! {
	static CALLER_DEADLINE: Instant;
}

/// Runs `fut` with adapter I/O due within `timeout` from now.
/// `None` leaves only the server limit in force.
pub async fn scope<F: Future>(timeout: Option<Duration>, fut: F) -> F::Output {
	match timeout {
		Some(timeout) => CALLER_DEADLINE.scope(Instant::now() + timeout, fut).await,
		None => fut.await,
	}
}

/// Time allowed for the next adapter call: `server_limit`, shortened to what
/// remains of the caller's deadline.
pub fn remaining(server_limit: Duration) -> Duration {
	CALLER_DEADLINE
		.try_with(|deadline| deadline.saturating_duration_since(Instant::now()))
		.map_or(server_limit, |left| left.min(server_limit))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn server_limit_applies_outside_a_scope() {
		assert_eq!(remaining(Duration::from_secs(30)), Duration::from_secs(30));
	}

	#[tokio::test]
	async fn caller_deadline_shortens_the_limit() {
		let limit = scope(Some(Duration::from_millis(500)), async {
			remaining(Duration::from_secs(30))
		})
		.await;
		assert!(limit <= Duration::from_millis(500));
		assert!(limit > Duration::from_millis(400));
	}

	#[tokio::test]
	async fn server_limit_wins_when_tighter() {
		let limit = scope(Some(Duration::from_secs(60)), async {
			remaining(Duration::from_secs(30))
		})
		.await;
		assert_eq!(limit, Duration::from_secs(30));
	}

	#[tokio::test]
	async fn deadline_is_shared_across_calls() {
		let left = scope(Some(Duration::from_millis(300)), async {
			tokio::time::sleep(Duration::from_millis(200)).await;
			remaining(Duration::from_secs(30))
		})
		.await;
		assert!(left <= Duration::from_millis(100));
	}

	#[tokio::test]
	async fn expired_deadline_leaves_no_time() {
		let left = scope(Some(Duration::from_millis(10)), async {
			tokio::time::sleep(Duration::from_millis(50)).await;
			remaining(Duration::from_secs(30))
		})
		.await;
		assert_eq!(left, Duration::ZERO);
	}
}
