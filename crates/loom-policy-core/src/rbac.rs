// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role inheritance graph backing the `g(...)` matcher functions.

use std::collections::{BTreeSet, HashMap, VecDeque};

/// Maximum inheritance depth followed by [`RoleManager::has_link`].
pub const MAX_HIERARCHY_LEVEL: usize = 10;

const NO_DOMAIN: &str = "";

/// Directed `user -> role` links, partitioned by domain.
#[derive(Debug, Clone, Default)]
pub struct RoleManager {
	links: HashMap<String, HashMap<String, BTreeSet<String>>>,
}

impl RoleManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn clear(&mut self) {
		self.links.clear();
	}

	pub fn add_link(&mut self, name: &str, role: &str, domain: Option<&str>) {
		self.links
			.entry(domain.unwrap_or(NO_DOMAIN).to_string())
			.or_default()
			.entry(name.to_string())
			.or_default()
			.insert(role.to_string());
	}

	pub fn delete_link(&mut self, name: &str, role: &str, domain: Option<&str>) -> bool {
		self.links
			.get_mut(domain.unwrap_or(NO_DOMAIN))
			.and_then(|graph| graph.get_mut(name))
			.map(|roles| roles.remove(role))
			.unwrap_or(false)
	}

	/// Whether `name` inherits `role`, directly or transitively.
	pub fn has_link(&self, name: &str, role: &str, domain: Option<&str>) -> bool {
		if name == role {
			return true;
		}
		let Some(graph) = self.links.get(domain.unwrap_or(NO_DOMAIN)) else {
			return false;
		};

		let mut frontier = VecDeque::from([(name, 0usize)]);
		let mut seen = BTreeSet::from([name]);
		while let Some((current, depth)) = frontier.pop_front() {
			if depth >= MAX_HIERARCHY_LEVEL {
				continue;
			}
			for next in graph.get(current).into_iter().flatten() {
				if next == role {
					return true;
				}
				if seen.insert(next.as_str()) {
					frontier.push_back((next.as_str(), depth + 1));
				}
			}
		}
		false
	}

	/// Roles directly assigned to `name`.
	pub fn roles(&self, name: &str, domain: Option<&str>) -> Vec<String> {
		self.links
			.get(domain.unwrap_or(NO_DOMAIN))
			.and_then(|graph| graph.get(name))
			.map(|roles| roles.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// Names directly assigned `role`.
	pub fn users(&self, role: &str, domain: Option<&str>) -> Vec<String> {
		let mut users: Vec<String> = self
			.links
			.get(domain.unwrap_or(NO_DOMAIN))
			.into_iter()
			.flat_map(|graph| graph.iter())
			.filter(|(_, roles)| roles.contains(role))
			.map(|(name, _)| name.clone())
			.collect();
		users.sort();
		users
	}

	/// Every role `name` inherits, breadth first, without duplicates.
	pub fn implicit_roles(&self, name: &str, domain: Option<&str>) -> Vec<String> {
		let mut result = Vec::new();
		let mut seen = BTreeSet::from([name.to_string()]);
		let mut frontier = VecDeque::from([(name.to_string(), 0usize)]);

		while let Some((current, depth)) = frontier.pop_front() {
			if depth >= MAX_HIERARCHY_LEVEL {
				continue;
			}
			for role in self.roles(&current, domain) {
				if seen.insert(role.clone()) {
					result.push(role.clone());
					frontier.push_back((role, depth + 1));
				}
			}
		}
		result
	}

	/// Domains in which `name` holds at least one role.
	pub fn domains(&self, name: &str) -> Vec<String> {
		let mut domains: Vec<String> = self
			.links
			.iter()
			.filter(|(domain, graph)| {
				!domain.is_empty() && graph.get(name).is_some_and(|roles| !roles.is_empty())
			})
			.map(|(domain, _)| domain.clone())
			.collect();
		domains.sort();
		domains
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> RoleManager {
		let mut rm = RoleManager::new();
		rm.add_link("alice", "data2_admin", None);
		rm.add_link("data2_admin", "super_admin", None);
		rm.add_link("bob", "reader", Some("tenant1"));
		rm
	}

	#[test]
	fn transitive_links() {
		let rm = sample();
		assert!(rm.has_link("alice", "data2_admin", None));
		assert!(rm.has_link("alice", "super_admin", None));
		assert!(!rm.has_link("data2_admin", "alice", None));
		assert!(rm.has_link("carol", "carol", None));
	}

	#[test]
	fn domains_are_isolated() {
		let rm = sample();
		assert!(rm.has_link("bob", "reader", Some("tenant1")));
		assert!(!rm.has_link("bob", "reader", None));
		assert_eq!(rm.domains("bob"), vec!["tenant1".to_string()]);
	}

	#[test]
	fn implicit_roles_follow_the_chain() {
		let rm = sample();
		assert_eq!(
			rm.implicit_roles("alice", None),
			vec!["data2_admin".to_string(), "super_admin".to_string()]
		);
		assert_eq!(rm.users("data2_admin", None), vec!["alice".to_string()]);
	}

	#[test]
	fn depth_is_bounded() {
		let mut rm = RoleManager::new();
		for i in 0..(MAX_HIERARCHY_LEVEL + 2) {
			rm.add_link(&format!("r{i}"), &format!("r{}", i + 1), None);
		}
		assert!(rm.has_link("r0", &format!("r{MAX_HIERARCHY_LEVEL}"), None));
		assert!(!rm.has_link("r0", &format!("r{}", MAX_HIERARCHY_LEVEL + 2), None));
	}

	#[test]
	fn cycles_terminate() {
		let mut rm = RoleManager::new();
		rm.add_link("a", "b", None);
		rm.add_link("b", "a", None);
		assert!(!rm.has_link("a", "c", None));
		assert!(rm.delete_link("a", "b", None));
		assert!(!rm.has_link("a", "b", None));
	}
}
