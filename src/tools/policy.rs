//! Built-in `policy_status` function
//!
//! Looks up the status of an insurance policy in a key → status dataset.
//! Unknown policy ids are an explicit `NotFound`, reported to the model as an
//! error payload.

use crate::errors::{RagError, Result};
use crate::tools::function::FunctionDescriptor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const POLICY_STATUS_FUNCTION: &str = "policy_status";

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PolicyQuery {
    /// Policy identifier, for example `H001`
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PolicyStatus {
    pub id: String,
    /// One of pending, approved or rejected
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDataset {
    entries: BTreeMap<String, String>,
}

impl PolicyDataset {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn lookup(&self, id: &str) -> Result<PolicyStatus> {
        self.entries
            .get(id)
            .map(|status| PolicyStatus {
                id: id.to_string(),
                status: status.clone(),
            })
            .ok_or_else(|| RagError::NotFound(format!("policy {}", id)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Descriptor for `policy_status` backed by `dataset`
pub fn policy_status_function(dataset: Arc<PolicyDataset>) -> Result<FunctionDescriptor> {
    FunctionDescriptor::typed(
        POLICY_STATUS_FUNCTION,
        "Get the status of an insurance policy by its id",
        move |query: PolicyQuery| {
            let dataset = Arc::clone(&dataset);
            async move { dataset.lookup(&query.id) }
        },
    )
}
