//! The blocking decision engine.
//!
//! Holds named blocklists, the whitelist, and the regex overlay, and answers
//! "is this domain blocked, and why" for the resolver hot path. Reads take the
//! shared side of one `RwLock` over the full state; mutations take the
//! exclusive side and are visible to subsequent decisions. Per-list hit
//! counters are atomics so a read-path match never needs the write lock.

use anyhow::{Context, Result};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::hosts::parse_hosts;

/// Reduces a queried name to the form every set and cache keys on:
/// ASCII-lowercased, with the trailing root dot removed.
pub fn canonicalize(name: &str) -> String {
    let name = name.strip_suffix('.').unwrap_or(name);
    name.to_ascii_lowercase()
}

/// Why a name was blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Matched (exactly or by parent suffix) a domain in the named list.
    List(String),
    /// Matched the regex overlay; carries the pattern source.
    Pattern(String),
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::List(name) => f.write_str(name),
            BlockReason::Pattern(source) => write!(f, "regex:{}", source),
        }
    }
}

/// Per-list figures reported to the management surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlocklistStats {
    /// Number of domains currently in the list.
    pub domains: usize,
    /// Queries this list has blocked since startup.
    pub blocks: u64,
}

/// Management capability over the engine. The HTTP surface is constructed
/// against this trait and the observer traits alone, so neither side needs
/// the other's concrete type.
pub trait BlocklistAdmin: Send + Sync {
    fn blocklist_stats(&self) -> HashMap<String, BlocklistStats>;
    fn add_domain(&self, list: &str, domain: &str);
    /// Returns `false` when the list or the domain was absent.
    fn remove_domain(&self, list: &str, domain: &str) -> bool;
    fn whitelist(&self) -> Vec<String>;
    fn add_whitelist(&self, domain: &str);
    fn remove_whitelist(&self, domain: &str) -> bool;
    fn regex_patterns(&self) -> Vec<String>;
    fn add_regex(&self, pattern: &str) -> Result<()>;
    fn remove_regex(&self, pattern: &str) -> bool;
}

struct Blocklist {
    domains: FxHashSet<Box<str>>,
    hits: AtomicU64,
}

impl Blocklist {
    fn new() -> Self {
        Self {
            domains: FxHashSet::default(),
            hits: AtomicU64::new(0),
        }
    }
}

#[derive(Default)]
struct EngineState {
    lists: FxHashMap<String, Blocklist>,
    whitelist: FxHashSet<String>,
    patterns: Vec<Regex>,
}

impl EngineState {
    fn list_entry(&mut self, name: &str) -> &mut Blocklist {
        self.lists
            .entry(name.to_string())
            .or_insert_with(Blocklist::new)
    }
}

/// Multi-list domain blocker with whitelist override and regex overlay.
pub struct BlockingEngine {
    state: RwLock<EngineState>,
}

impl Default for BlockingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockingEngine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(EngineState::default()),
        }
    }

    /// Decides whether `name` is blocked.
    ///
    /// Decision order: whitelist, then each list's exact and parent-suffix
    /// domains, then the regex overlay in insertion order. A list match bumps
    /// that list's hit counter; regex matches bump nothing.
    pub fn is_blocked(&self, name: &str) -> Option<BlockReason> {
        let name = canonicalize(name);
        let state = self.state.read().unwrap();

        if state.whitelist.contains(&name) {
            return None;
        }

        for (list_name, list) in &state.lists {
            if list.domains.contains(name.as_str()) {
                list.hits.fetch_add(1, Ordering::Relaxed);
                return Some(BlockReason::List(list_name.clone()));
            }

            // Walk proper suffixes: a.b.c -> b.c -> c
            let mut part = name.as_str();
            while let Some(idx) = part.find('.') {
                part = &part[idx + 1..];
                if part.is_empty() {
                    break;
                }
                if list.domains.contains(part) {
                    list.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(BlockReason::List(list_name.clone()));
                }
            }
        }

        for pattern in &state.patterns {
            if pattern.is_match(&name) {
                return Some(BlockReason::Pattern(pattern.as_str().to_string()));
            }
        }

        None
    }

    /// Bulk-loads hosts-file text into the named list, creating it on first
    /// use. Returns the list's domain count afterwards.
    pub fn load_hosts(&self, text: &str, list_name: &str) -> usize {
        let mut state = self.state.write().unwrap();
        let list = state.list_entry(list_name);
        for domain in parse_hosts(text) {
            list.domains.insert(domain.into_boxed_str());
        }
        list.domains.len()
    }

    pub fn is_whitelisted(&self, domain: &str) -> bool {
        let state = self.state.read().unwrap();
        state.whitelist.contains(&canonicalize(domain))
    }
}

impl BlocklistAdmin for BlockingEngine {
    fn blocklist_stats(&self) -> HashMap<String, BlocklistStats> {
        let state = self.state.read().unwrap();
        state
            .lists
            .iter()
            .map(|(name, list)| {
                (
                    name.clone(),
                    BlocklistStats {
                        domains: list.domains.len(),
                        blocks: list.hits.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }

    fn add_domain(&self, list: &str, domain: &str) {
        let mut state = self.state.write().unwrap();
        state
            .list_entry(list)
            .domains
            .insert(canonicalize(domain).into_boxed_str());
    }

    fn remove_domain(&self, list: &str, domain: &str) -> bool {
        let mut state = self.state.write().unwrap();
        match state.lists.get_mut(list) {
            Some(list) => list.domains.remove(canonicalize(domain).as_str()),
            None => false,
        }
    }

    fn whitelist(&self) -> Vec<String> {
        let state = self.state.read().unwrap();
        let mut domains: Vec<String> = state.whitelist.iter().cloned().collect();
        domains.sort();
        domains
    }

    fn add_whitelist(&self, domain: &str) {
        let mut state = self.state.write().unwrap();
        state.whitelist.insert(canonicalize(domain));
    }

    fn remove_whitelist(&self, domain: &str) -> bool {
        let mut state = self.state.write().unwrap();
        state.whitelist.remove(&canonicalize(domain))
    }

    fn regex_patterns(&self) -> Vec<String> {
        let state = self.state.read().unwrap();
        state
            .patterns
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    fn add_regex(&self, pattern: &str) -> Result<()> {
        let compiled = Regex::new(pattern)
            .with_context(|| format!("Invalid block pattern '{}'", pattern))?;
        let mut state = self.state.write().unwrap();
        state.patterns.push(compiled);
        Ok(())
    }

    fn remove_regex(&self, pattern: &str) -> bool {
        let mut state = self.state.write().unwrap();
        match state.patterns.iter().position(|p| p.as_str() == pattern) {
            Some(idx) => {
                state.patterns.remove(idx);
                true
            }
            None => false,
        }
    }
}
