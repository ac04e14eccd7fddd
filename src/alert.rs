//! data structures for deserializing incoming alerts
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// status value of a firing alert
pub const STATUS_FIRING: &str = "firing";
/// status value of a resolved alert
pub const STATUS_RESOLVED: &str = "resolved";

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// data from prometheus received by the alertmanager webhook receiver
pub struct Data {
	#[serde(default)]
	pub version: String,
	#[serde(default)]
	pub group_key: String,
	#[serde(default)]
	pub truncated_alerts: u64,

	#[serde(default)]
	pub receiver: String,
	pub status: String,
	#[serde(default)]
	pub alerts: Vec<Alert>,
	#[serde(default)]
	pub group_labels: HashMap<String, String>,
	#[serde(default)]
	pub common_labels: HashMap<String, String>,
	#[serde(default)]
	pub common_annotations: HashMap<String, String>,
	#[serde(default, rename = "externalURL")]
	pub external_url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
/// a single alert of an alertmanager notification
pub struct Alert {
	pub status: String,
	#[serde(default)]
	pub labels: HashMap<String, String>,
	#[serde(default)]
	pub annotations: HashMap<String, String>,
	pub starts_at: DateTime<Utc>,
	/// alertmanager sends `0001-01-01T00:00:00Z` for alerts that are still firing
	pub ends_at: DateTime<Utc>,
	#[serde(default, rename = "generatorURL")]
	pub generator_url: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fingerprint: Option<String>,
}

impl Alert {
	pub fn is_firing(&self) -> bool {
		self.status == STATUS_FIRING
	}

	pub fn is_resolved(&self) -> bool {
		self.status == STATUS_RESOLVED
	}
}
