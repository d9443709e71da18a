// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Document-store policy storage on MongoDB.
//!
//! Each rule is one document in the `policy_rules` collection:
//! `{ ptype: "p", v0: "alice", v1: "data1", v2: "read" }`. Only the fields a
//! rule actually has are stored.

use async_trait::async_trait;
use loom_policy_core::{Adapter, AdapterError, PolicyLine};
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};

use crate::sql::DEFAULT_DATABASE;

const COLLECTION: &str = "policy_rules";
const VALUE_FIELDS: usize = 6;

fn db_error(e: mongodb::error::Error) -> AdapterError {
	AdapterError::Database(Box::new(e))
}

fn value_key(index: usize) -> String {
	format!("v{index}")
}

fn rule_document(ptype: &str, rule: &[String]) -> Result<Document, AdapterError> {
	if rule.len() > VALUE_FIELDS {
		return Err(AdapterError::TooManyFields {
			ptype: ptype.to_string(),
			max: VALUE_FIELDS,
			actual: rule.len(),
		});
	}
	let mut document = doc! { "ptype": ptype };
	for (i, value) in rule.iter().enumerate() {
		document.insert(value_key(i), value.as_str());
	}
	Ok(document)
}

/// Reads `ptype` and `v0..` in order. Trailing empty values are dropped.
fn rule_from_document(document: &Document) -> Option<PolicyLine> {
	let ptype = document.get_str("ptype").ok()?;
	let mut rule: Vec<String> = (0..VALUE_FIELDS)
		.map_while(|i| document.get_str(value_key(i)).ok().map(str::to_string))
		.collect();
	while rule.last().is_some_and(|v| v.is_empty()) {
		rule.pop();
	}
	Some(PolicyLine::new(ptype, rule))
}

/// Matches rules of `ptype` whose fields from `field_index` on equal `field_values`.
/// Empty values match anything.
fn filter_document(ptype: &str, field_index: usize, field_values: &[String]) -> Document {
	let mut filter = doc! { "ptype": ptype };
	for (offset, value) in field_values.iter().enumerate() {
		if !value.is_empty() {
			filter.insert(value_key(field_index + offset), value.as_str());
		}
	}
	filter
}

/// Policy storage in a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoAdapter {
	rules: Collection<Document>,
}

impl MongoAdapter {
	/// Connects and pings the server. The database named in the connection
	/// string is used, or [`DEFAULT_DATABASE`] when it names none.
	#[tracing::instrument(skip(connection))]
	pub async fn connect(connection: &str) -> Result<Self, AdapterError> {
		let options = ClientOptions::parse(connection).await.map_err(db_error)?;
		let database = options
			.default_database
			.clone()
			.unwrap_or_else(|| DEFAULT_DATABASE.to_string());
		let client = Client::with_options(options).map_err(db_error)?;

		let db = client.database(&database);
		db.run_command(doc! { "ping": 1 }).await.map_err(db_error)?;

		tracing::debug!(database = %database, "policy collection ready");
		Ok(Self {
			rules: db.collection(COLLECTION),
		})
	}
}

#[async_trait]
impl Adapter for MongoAdapter {
	fn driver(&self) -> &str {
		"mongodb"
	}

	async fn load_policy(&self) -> Result<Vec<PolicyLine>, AdapterError> {
		let mut cursor = self.rules.find(doc! {}).await.map_err(db_error)?;
		let mut lines = Vec::new();
		while cursor.advance().await.map_err(db_error)? {
			let document = cursor.deserialize_current().map_err(db_error)?;
			match rule_from_document(&document) {
				Some(line) => lines.push(line),
				None => tracing::warn!(?document, "skipping rule document without ptype"),
			}
		}
		Ok(lines)
	}

	async fn save_policy(&self, lines: &[PolicyLine]) -> Result<(), AdapterError> {
		let documents = lines
			.iter()
			.map(|line| rule_document(&line.ptype, &line.rule))
			.collect::<Result<Vec<_>, _>>()?;

		self.rules.delete_many(doc! {}).await.map_err(db_error)?;
		if !documents.is_empty() {
			self.rules.insert_many(documents).await.map_err(db_error)?;
		}
		Ok(())
	}

	async fn add_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError> {
		let documents = rules
			.iter()
			.map(|rule| rule_document(ptype, rule))
			.collect::<Result<Vec<_>, _>>()?;
		if !documents.is_empty() {
			self.rules.insert_many(documents).await.map_err(db_error)?;
		}
		Ok(())
	}

	async fn remove_policies(&self, ptype: &str, rules: &[Vec<String>]) -> Result<(), AdapterError> {
		for rule in rules {
			let filter = rule_document(ptype, rule)?;
			self.rules.delete_one(filter).await.map_err(db_error)?;
		}
		Ok(())
	}

	async fn remove_filtered_policy(
		&self,
		ptype: &str,
		field_index: usize,
		field_values: &[String],
	) -> Result<(), AdapterError> {
		let filter = filter_document(ptype, field_index, field_values);
		self.rules.delete_many(filter).await.map_err(db_error)?;
		Ok(())
	}
}
