//! Allowance registry.
//!
//! Maps an owner type name to the set of members inside which blocking is not
//! reported. Every guarded call consults it; a lookup only read-locks the
//! shard holding the owner.

use std::collections::HashSet;

use dashmap::DashMap;
use tracing::{debug, info};

use stallwatch_core::AllowanceEntry;

/// Registered (owner, member) pairs that suppress detection.
#[derive(Default)]
pub struct AllowanceRegistry {
    allowances: DashMap<String, HashSet<String>>,
}

impl AllowanceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from configured entries.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = &'a AllowanceEntry>) -> Self {
        let registry = Self::new();
        for entry in entries {
            registry.allow(entry.owner.clone(), entry.member.clone());
        }
        registry
    }

    /// Allow blocking inside `owner.member`.
    ///
    /// Returns `true` if the pair was not already allowed.
    pub fn allow(&self, owner: impl Into<String>, member: impl Into<String>) -> bool {
        let owner = owner.into();
        let member = member.into();

        let inserted = self
            .allowances
            .entry(owner.clone())
            .or_default()
            .insert(member.clone());

        if inserted {
            info!(owner = %owner, member = %member, "Blocking allowed inside call site");
        }
        inserted
    }

    /// Stop allowing blocking inside `owner.member`.
    ///
    /// Returns `true` if the pair was allowed.
    pub fn disallow(&self, owner: &str, member: &str) -> bool {
        let removed = match self.allowances.get_mut(owner) {
            Some(mut members) => members.remove(member),
            None => false,
        };

        if removed {
            self.allowances.remove_if(owner, |_, members| members.is_empty());
            debug!(owner = owner, member = member, "Allowance removed");
        }
        removed
    }

    /// Check if detection is suppressed for `owner.member`.
    pub fn is_suppressed(&self, owner: &str, member: &str) -> bool {
        self.allowances
            .get(owner)
            .is_some_and(|members| members.contains(member))
    }

    /// Check if any member of `owner` is allowed.
    pub fn contains_owner(&self, owner: &str) -> bool {
        self.allowances.contains_key(owner)
    }

    /// Number of allowed (owner, member) pairs.
    pub fn len(&self) -> usize {
        self.allowances.iter().map(|entry| entry.value().len()).sum()
    }

    /// Check if no pair is allowed.
    pub fn is_empty(&self) -> bool {
        self.allowances.iter().all(|entry| entry.value().is_empty())
    }

    /// All allowed pairs, sorted by owner then member.
    pub fn entries(&self) -> Vec<AllowanceEntry> {
        let mut entries: Vec<AllowanceEntry> = self
            .allowances
            .iter()
            .flat_map(|entry| {
                let owner = entry.key().clone();
                entry
                    .value()
                    .iter()
                    .map(|member| AllowanceEntry::new(owner.clone(), member.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        entries.sort_by(|a, b| (&a.owner, &a.member).cmp(&(&b.owner, &b.member)));
        entries
    }

    /// Remove every allowance.
    pub fn clear(&self) {
        self.allowances.clear();
        debug!("Allowances cleared");
    }
}

impl std::fmt::Debug for AllowanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowanceRegistry")
            .field("allowances", &self.entries())
            .finish()
    }
}
