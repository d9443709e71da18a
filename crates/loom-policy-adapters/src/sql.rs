// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Relational policy storage over `sqlx::Any`.
//!
//! Rules live in a single `policy_rules` table with six value columns. Unused
//! trailing columns hold the empty string.

use async_trait::async_trait;
use loom_policy_core::{Adapter, AdapterError, PolicyLine};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Row};

use crate::Driver;

/// Database created when the connection string does not name one.
pub const DEFAULT_DATABASE: &str = "loom_policy";

const TABLE: &str = "policy_rules";
const VALUE_COLUMNS: usize = 6;

fn db_error(e: sqlx::Error) -> AdapterError {
	AdapterError::Database(Box::new(e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
	Sqlite,
	Postgres,
	MySql,
}

impl Dialect {
	fn placeholder(self, n: usize) -> String {
		match self {
			Dialect::Postgres => format!("${n}"),
			Dialect::Sqlite | Dialect::MySql => "?".to_string(),
		}
	}

	fn create_table(self) -> String {
		let (id, text) = match self {
			Dialect::Sqlite => ("id INTEGER PRIMARY KEY AUTOINCREMENT", "TEXT"),
			Dialect::Postgres => ("id BIGSERIAL PRIMARY KEY", "VARCHAR(255)"),
			Dialect::MySql => ("id BIGINT AUTO_INCREMENT PRIMARY KEY", "VARCHAR(255)"),
		};
		let values: Vec<String> = (0..VALUE_COLUMNS)
			.map(|i| format!("v{i} {text} NOT NULL DEFAULT ''"))
			.collect();
		format!(
			"CREATE TABLE IF NOT EXISTS {TABLE} ({id}, ptype {text} NOT NULL, {})",
			values.join(", ")
		)
	}
}

/// Policy storage in SQLite, PostgreSQL or MySQL.
#[derive(Debug, Clone)]
pub struct SqlAdapter {
	pool: AnyPool,
	dialect: Dialect,
	driver: Driver,
}

impl SqlAdapter {
	/// Connects and creates the rule table if needed.
	///
	/// With `db_specified == false` on a server database, the URL is treated as
	/// a server address and [`DEFAULT_DATABASE`] is created and used.
	#[tracing::instrument(skip(connection), fields(driver = driver.as_str()))]
	pub async fn connect(
		driver: Driver,
		connection: &str,
		db_specified: bool,
	) -> Result<Self, AdapterError> {
		install_default_drivers();

		let dialect = match driver {
			Driver::Sqlite => Dialect::Sqlite,
			Driver::Postgres => Dialect::Postgres,
			Driver::MySql => Dialect::MySql,
			Driver::File | Driver::MongoDb => {
				return Err(AdapterError::Database(
					format!("the {} driver is not a SQL database", driver.as_str()).into(),
				))
			}
		};

		let url = match dialect {
			Dialect::Sqlite => sqlite_url(connection),
			_ if db_specified => connection.to_string(),
			_ => ensure_database(dialect, connection).await?,
		};

		let options = match dialect {
			// One connection keeps an in-memory database alive for the pool's lifetime.
			Dialect::Sqlite => AnyPoolOptions::new()
				.max_connections(1)
				.idle_timeout(None)
				.max_lifetime(None),
			_ => AnyPoolOptions::new().max_connections(8),
		};
		let pool = options.connect(&url).await.map_err(db_error)?;

		sqlx::query(&dialect.create_table())
			.execute(&pool)
			.await
			.map_err(db_error)?;

		tracing::debug!("policy table ready");
		Ok(Self {
			pool,
			dialect,
			driver,
		})
	}

	fn padded(ptype: &str, rule: &[String]) -> Result<Vec<String>, AdapterError> {
		if rule.len() > VALUE_COLUMNS {
			return Err(AdapterError::TooManyFields {
				ptype: ptype.to_string(),
				max: VALUE_COLUMNS,
				actual: rule.len(),
			});
		}
		let mut values = rule.to_vec();
		values.resize(VALUE_COLUMNS, String::new());
		Ok(values)
	}

	fn insert_sql(&self) -> String {
		let columns: Vec<String> = (0..VALUE_COLUMNS).map(|i| format!("v{i}")).collect();
		let params: Vec<String> = (1..=VALUE_COLUMNS + 1)
			.map(|n| self.dialect.placeholder(n))
			.collect();
		format!(
			"INSERT INTO {TABLE} (ptype, {}) VALUES ({})",
			columns.join(", "),
			params.join(", ")
		)
	}

	fn delete_sql(&self, columns: &[String]) -> String {
		let mut clauses = vec![format!("ptype = {}", self.dialect.placeholder(1))];
		clauses.extend(
			columns
				.iter()
				.enumerate()
				.map(|(i, column)| format!("{column} = {}", self.dialect.placeholder(i + 2))),
		);
		format!("DELETE FROM {TABLE} WHERE {}", clauses.join(" AND "))
	}

	async fn insert_lines<'a>(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Any>,
		lines: impl Iterator<Item = (&'a str, &'a [String])>,
	) -> Result<(), AdapterError> {
		let sql = self.insert_sql();
		for (ptype, rule) in lines {
			let mut query = sqlx::query(&sql).bind(ptype.to_string());
			for value in Self::padded(ptype, rule)? {
				query = query.bind(value);
			}
			query.execute(&mut **tx).await.map_err(db_error)?;
		}
		Ok(())
	}
}

#[async_trait]
impl Adapter for SqlAdapter {
	fn driver(&self) -> &str {
		self.driver.as_str()
	}

	#[tracing::instrument(skip(self), fields(driver = self.driver.as_str()))]
	async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError> {
		let rows = sqlx::query(&format!(
			"SELECT ptype, v0, v1, v2, v3, v4, v5 FROM {TABLE} ORDER BY id"
		))
		.fetch_all(&self.pool)
		.await
		.map_err(db_error)?;

		let mut lines = Vec::with_capacity(rows.len());
		for row in rows {
			let ptype: String = row.try_get("ptype").map_err(db_error)?;
			let mut rule = Vec::with_capacity(VALUE_COLUMNS);
			for i in 0..VALUE_COLUMNS {
				rule.push(row.try_get::<String, _>(i + 1).map_err(db_error)?);
			}
			while rule.last().is_some_and(String::is_empty) {
				rule.pop();
			}
			lines.push(PolicyLine::new(ptype, rule));
		}
		tracing::debug!(rules = lines.len(), "policy rows loaded");
		Ok(lines)
	}

	#[tracing::instrument(skip(self, lines), fields(driver = self.driver.as_str(), rules = lines.len()))]
	async fn save_policy(&self, lines: &[PolicyLine]) -> Result<(), AdapterError> {
		let mut tx = self.pool.begin().await.map_err(db_error)?;
		sqlx::query(&format!("DELETE FROM {TABLE}"))
			.execute(&mut *tx)
			.await
			.map_err(db_error)?;
		self.insert_lines(
			&mut tx,
			lines.iter().map(|l| (l.ptype.as_str(), l.rule.as_slice())),
		)
		.await?;
		tx.commit().await.map_err(db_error)
	}

	async fn add_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError> {
		let mut tx = self.pool.begin().await.map_err(db_error)?;
		self.insert_lines(&mut tx, rules.iter().map(|r| (ptype, r.as_slice())))
			.await?;
		tx.commit().await.map_err(db_error)
	}

	async fn remove_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError> {
		let columns: Vec<String> = (0..VALUE_COLUMNS).map(|i| format!("v{i}")).collect();
		let sql = self.delete_sql(&columns);
		for rule in rules {
			let mut query = sqlx::query(&sql).bind(ptype.to_string());
			for value in Self::padded(ptype, rule)? {
				query = query.bind(value);
			}
			query.execute(&self.pool).await.map_err(db_error)?;
		}
		Ok(())
	}

	async fn remove_filtered_policy(
		&self,
		ptype: &str,
		field_index: usize,
		field_values: &[String],
	) -> Result<(), AdapterError> {
		if field_index + field_values.len() > VALUE_COLUMNS {
			return Err(AdapterError::TooManyFields {
				ptype: ptype.to_string(),
				max: VALUE_COLUMNS,
				actual: field_index + field_values.len(),
			});
		}
		let filters: Vec<(String, String)> = field_values
			.iter()
			.enumerate()
			.filter(|(_, value)| !value.is_empty())
			.map(|(i, value)| (format!("v{}", field_index + i), value.clone()))
			.collect();

		let columns: Vec<String> = filters.iter().map(|(c, _)| c.clone()).collect();
		let sql = self.delete_sql(&columns);
		let mut query = sqlx::query(&sql).bind(ptype.to_string());
		for (_, value) in filters {
			query = query.bind(value);
		}
		query.execute(&self.pool).await.map_err(db_error)?;
		Ok(())
	}
}

fn sqlite_url(connection: &str) -> String {
	match connection {
		c if c.starts_with("sqlite:") => c.to_string(),
		":memory:" => "sqlite::memory:".to_string(),
		path => format!("sqlite://{path}?mode=rwc"),
	}
}

/// Creates [`DEFAULT_DATABASE`] on the server at `connection` and returns a URL for it.
async fn ensure_database(dialect: Dialect, connection: &str) -> Result<String, AdapterError> {
	let (base, query) = match connection.split_once('?') {
		Some((base, query)) => (base.trim_end_matches('/'), Some(query)),
		None => (connection.trim_end_matches('/'), None),
	};

	let admin = AnyPoolOptions::new()
		.max_connections(1)
		.connect(connection)
		.await
		.map_err(db_error)?;

	match dialect {
		Dialect::Postgres => {
			let exists = sqlx::query("SELECT 1 FROM pg_database WHERE datname = $1")
				.bind(DEFAULT_DATABASE)
				.fetch_optional(&admin)
				.await
				.map_err(db_error)?
				.is_some();
			if !exists {
				sqlx::query(&format!("CREATE DATABASE {DEFAULT_DATABASE}"))
					.execute(&admin)
					.await
					.map_err(db_error)?;
			}
		}
		_ => {
			sqlx::query(&format!("CREATE DATABASE IF NOT EXISTS {DEFAULT_DATABASE}"))
				.execute(&admin)
				.await
				.map_err(db_error)?;
		}
	}
	admin.close().await;
	tracing::info!(database = DEFAULT_DATABASE, "using default policy database");

	Ok(match query {
		Some(query) => format!("{base}/{DEFAULT_DATABASE}?{query}"),
		None => format!("{base}/{DEFAULT_DATABASE}"),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn s(v: &[&str]) -> Vec<String> {
		v.iter().map(|x| x.to_string()).collect()
	}

	async fn memory() -> SqlAdapter {
		SqlAdapter::connect(Driver::Sqlite, ":memory:", true)
			.await
			.unwrap()
	}

	#[test]
	fn placeholders_follow_the_dialect() {
		assert_eq!(Dialect::Postgres.placeholder(3), "$3");
		assert_eq!(Dialect::MySql.placeholder(3), "?");
		assert!(Dialect::Sqlite.create_table().contains("v5 TEXT NOT NULL DEFAULT ''"));
	}

	#[test]
	fn sqlite_urls() {
		assert_eq!(sqlite_url(":memory:"), "sqlite::memory:");
		assert_eq!(sqlite_url("sqlite://x.db"), "sqlite://x.db");
		assert_eq!(sqlite_url("/tmp/p.db"), "sqlite:///tmp/p.db?mode=rwc");
	}

	#[tokio::test]
	async fn save_then_load_preserves_order_and_trims_padding() {
		let adapter = memory().await;
		let lines = vec![
			PolicyLine::new("p", s(&["alice", "data1", "read"])),
			PolicyLine::new("g", s(&["alice", "admin"])),
		];
		adapter.save_policy(&lines).await.unwrap();
		assert_eq!(adapter.load_policy().await.unwrap(), lines);

		adapter.save_policy(&lines[1..]).await.unwrap();
		assert_eq!(adapter.load_policy().await.unwrap(), lines[1..].to_vec());
	}

	#[tokio::test]
	async fn incremental_add_and_remove() {
		let adapter = memory().await;
		adapter
			.add_policies(
				"p",
				&[s(&["alice", "data1", "read"]), s(&["bob", "data1", "write"])],
			)
			.await
			.unwrap();
		adapter
			.remove_policies("p", &[s(&["alice", "data1", "read"])])
			.await
			.unwrap();
		assert_eq!(
			adapter.load_policy().await.unwrap(),
			vec![PolicyLine::new("p", s(&["bob", "data1", "write"]))]
		);
	}

	#[tokio::test]
	async fn filtered_removal_ignores_empty_values() {
		let adapter = memory().await;
		adapter
			.add_policies(
				"p",
				&[
					s(&["alice", "data1", "read"]),
					s(&["bob", "data1", "write"]),
					s(&["bob", "data2", "read"]),
				],
			)
			.await
			.unwrap();
		adapter
			.remove_filtered_policy("p", 1, &s(&["data1", ""]))
			.await
			.unwrap();
		assert_eq!(
			adapter.load_policy().await.unwrap(),
			vec![PolicyLine::new("p", s(&["bob", "data2", "read"]))]
		);
	}

	#[tokio::test]
	async fn oversized_rules_are_rejected() {
		let adapter = memory().await;
		let rule = s(&["a", "b", "c", "d", "e", "f", "g"]);
		assert!(matches!(
			adapter.add_policies("p", &[rule]).await,
			Err(AdapterError::TooManyFields { max: 6, actual: 7, .. })
		));
	}
}
