//! Reference groups.
//!
//! Walked references are tallied into a tree of named groups: a built-in set
//! covering the common ref namespaces, extended by user-defined groups from
//! configuration (dotted symbols nest). A group may carry a filter built from
//! its configured rules; a group without a filter matches whatever any of its
//! descendants matches. Every non-leaf group gains an implicit "Other" sink
//! for references it matches that none of its explicit subgroups claim, and
//! references rejected by the top-level walk filter land in an "Ignored"
//! pseudo-group.

use std::collections::HashMap;

use bstr::BStr;
use serde::Serialize;

use crate::{
    counter::Count32,
    errors::GitError,
    internal::refs::filter::ReferenceFilter,
};

/// One reference-group configuration entry, e.g. gitconfig
/// `shape.refgroup.misc.foo.include = refs/foo` arrives as
/// `GroupRule { symbol: "misc.foo", key: "include", value: "refs/foo" }`.
#[derive(Debug, Clone)]
pub struct GroupRule {
    pub symbol: String,
    pub key: String,
    pub value: String,
}

/// A per-group reference tally, ready for the report formatter.
#[derive(Debug, Clone, Serialize)]
pub struct RefGroupTally {
    pub symbol: String,
    pub name: String,
    pub count: Count32,
}

struct GroupNode {
    symbol: String,
    name: String,
    filter: Option<ReferenceFilter>,
    children: Vec<usize>,
}

impl GroupNode {
    fn other_symbol(&self) -> String {
        if self.symbol.is_empty() {
            "other".to_string()
        } else {
            format!("{}.other", self.symbol)
        }
    }
}

/// Classifies reference names: decides which references are walk roots and
/// which group symbols each reference counts under.
pub struct RefGrouper {
    top_filter: ReferenceFilter,
    nodes: Vec<GroupNode>,
    counts: HashMap<String, Count32>,
    ignored: Count32,
}

const ROOT: usize = 0;

impl Default for RefGrouper {
    fn default() -> Self {
        Self::new()
    }
}

impl RefGrouper {
    /// A grouper with the built-in groups and a walk-everything top filter.
    pub fn new() -> RefGrouper {
        let mut grouper = RefGrouper {
            top_filter: ReferenceFilter::All,
            nodes: vec![GroupNode {
                symbol: String::new(),
                name: "References".to_string(),
                // the root matches every walked ref so its "Other" sink can
                // catch refs no explicit group claims
                filter: Some(ReferenceFilter::All),
                children: Vec::new(),
            }],
            counts: HashMap::new(),
            ignored: Count32::default(),
        };
        let builtins: [(&str, &str, ReferenceFilter); 7] = [
            ("branches", "Branches", ReferenceFilter::prefix("refs/heads")),
            ("tags", "Tags", ReferenceFilter::prefix("refs/tags")),
            (
                "remotes",
                "Remote-tracking refs",
                ReferenceFilter::prefix("refs/remotes"),
            ),
            (
                "pulls",
                "Pull request refs",
                ReferenceFilter::prefix("refs/pull"),
            ),
            (
                "changes",
                "Changeset refs",
                ReferenceFilter::regexp(r"refs/changes/\d{2}/\d+/\d+")
                    .expect("built-in pattern compiles"),
            ),
            ("notes", "Git notes", ReferenceFilter::prefix("refs/notes")),
            (
                "stash",
                "Git stash",
                ReferenceFilter::regexp("refs/stash").expect("built-in pattern compiles"),
            ),
        ];
        for (symbol, name, filter) in builtins {
            let idx = grouper.nodes.len();
            grouper.nodes.push(GroupNode {
                symbol: symbol.to_string(),
                name: name.to_string(),
                filter: Some(filter),
                children: Vec::new(),
            });
            grouper.nodes[ROOT].children.push(idx);
        }
        grouper
    }

    /// Replace the top-level walk filter derived from command-line options.
    pub fn set_top_filter(&mut self, filter: ReferenceFilter) {
        self.top_filter = filter;
    }

    /// Fold configuration entries into the group tree, in declaration order.
    /// Unrecognized keys are ignored.
    pub fn apply_config(&mut self, rules: &[GroupRule]) -> Result<(), GitError> {
        for rule in rules {
            let idx = self.ensure_group(&rule.symbol)?;
            match rule.key.as_str() {
                "name" => self.nodes[idx].name = rule.value.clone(),
                "include" => {
                    let f = ReferenceFilter::prefix(rule.value.as_str());
                    let base = self.nodes[idx].filter.take();
                    self.nodes[idx].filter = Some(ReferenceFilter::include(base, f));
                }
                "includeregexp" => {
                    let f = ReferenceFilter::regexp(&rule.value)?;
                    let base = self.nodes[idx].filter.take();
                    self.nodes[idx].filter = Some(ReferenceFilter::include(base, f));
                }
                "exclude" => {
                    let f = ReferenceFilter::prefix(rule.value.as_str());
                    let base = self.nodes[idx].filter.take();
                    self.nodes[idx].filter = Some(ReferenceFilter::exclude(base, f));
                }
                "excluderegexp" => {
                    let f = ReferenceFilter::regexp(&rule.value)?;
                    let base = self.nodes[idx].filter.take();
                    self.nodes[idx].filter = Some(ReferenceFilter::exclude(base, f));
                }
                other => {
                    tracing::debug!("ignoring unknown refgroup key `{other}` for `{}`", rule.symbol);
                }
            }
        }
        Ok(())
    }

    /// Find the group for a dotted symbol, creating it (and any missing
    /// ancestors) on demand.
    fn ensure_group(&mut self, symbol: &str) -> Result<usize, GitError> {
        if symbol.is_empty() {
            return Err(GitError::InvalidRefGroupConfig(
                "empty group symbol".to_string(),
            ));
        }
        let mut current = ROOT;
        let mut path = String::new();
        for component in symbol.split('.') {
            if component.is_empty() {
                return Err(GitError::InvalidRefGroupConfig(format!(
                    "empty component in group symbol `{symbol}`"
                )));
            }
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(component);
            let found = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].symbol == path);
            current = match found {
                Some(idx) => idx,
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(GroupNode {
                        symbol: path.clone(),
                        name: component.to_string(),
                        filter: None,
                        children: Vec::new(),
                    });
                    self.nodes[current].children.push(idx);
                    idx
                }
            };
        }
        Ok(current)
    }

    /// Categorize one refname: whether its tip is a walk root, and the
    /// ordered group symbols it counts under. Pure; categorizing the same
    /// name twice yields the same answer.
    pub fn categorize(&self, refname: &BStr) -> (bool, Vec<String>) {
        if !self.top_filter.matches(refname) {
            return (false, Vec::new());
        }
        let mut symbols = Vec::new();
        self.walk_node(ROOT, refname, &mut symbols);
        (true, symbols)
    }

    fn walk_node(&self, idx: usize, refname: &BStr, out: &mut Vec<String>) -> bool {
        let node = &self.nodes[idx];
        let own = node.filter.as_ref().map(|f| f.matches(refname));
        if own == Some(false) {
            return false;
        }
        let mut child_symbols = Vec::new();
        let mut any_child = false;
        for &child in &node.children {
            if self.walk_node(child, refname, &mut child_symbols) {
                any_child = true;
            }
        }
        let matched = match own {
            Some(matched) => matched,
            None => any_child,
        };
        if matched {
            if !node.symbol.is_empty() {
                out.push(node.symbol.clone());
            }
            out.append(&mut child_symbols);
            if own == Some(true) && !any_child && !node.children.is_empty() {
                out.push(node.other_symbol());
            }
        }
        matched
    }

    /// Categorize a refname and fold it into the running tallies.
    pub fn record(&mut self, refname: &BStr) -> (bool, Vec<String>) {
        let (walk, symbols) = self.categorize(refname);
        if walk {
            for symbol in &symbols {
                self.counts
                    .entry(symbol.clone())
                    .or_default()
                    .increment(Count32::new(1));
            }
        } else {
            self.ignored.increment(Count32::new(1));
        }
        (walk, symbols)
    }

    /// The effective filter of a named group, for translating a
    /// "walk only this group" flag into a top-level include.
    pub fn group_filter(&self, symbol: &str) -> Result<ReferenceFilter, GitError> {
        let idx = self
            .nodes
            .iter()
            .position(|n| !n.symbol.is_empty() && n.symbol == symbol)
            .ok_or_else(|| GitError::UnknownRefGroup(symbol.to_string()))?;
        Ok(self.effective_filter(idx))
    }

    fn effective_filter(&self, idx: usize) -> ReferenceFilter {
        let node = &self.nodes[idx];
        if let Some(filter) = &node.filter {
            return filter.clone();
        }
        let mut combined: Option<ReferenceFilter> = None;
        for &child in &node.children {
            let f = self.effective_filter(child);
            combined = Some(match combined.take() {
                None => f,
                Some(prev) => ReferenceFilter::union(prev, f),
            });
        }
        combined.unwrap_or(ReferenceFilter::Nothing)
    }

    /// The ordered group list with per-group reference counts: explicit
    /// groups in tree order, each followed by its subtree, "Other" sinks
    /// after their siblings, and "Ignored" last. Sinks appear only when
    /// nonzero.
    pub fn tallies(&self) -> Vec<RefGroupTally> {
        let mut out = Vec::new();
        self.collect_tallies(ROOT, &mut out);
        let (ignored, _) = self.ignored.to_u64();
        if ignored > 0 {
            out.push(RefGroupTally {
                symbol: "ignored".to_string(),
                name: "Ignored".to_string(),
                count: self.ignored,
            });
        }
        out
    }

    fn collect_tallies(&self, idx: usize, out: &mut Vec<RefGroupTally>) {
        let node = &self.nodes[idx];
        for &child in &node.children {
            let c = &self.nodes[child];
            out.push(RefGroupTally {
                symbol: c.symbol.clone(),
                name: c.name.clone(),
                count: self.counts.get(&c.symbol).copied().unwrap_or_default(),
            });
            self.collect_tallies(child, out);
        }
        if !node.children.is_empty() {
            let other = node.other_symbol();
            if let Some(count) = self.counts.get(&other) {
                if count.value() > 0 {
                    out.push(RefGroupTally {
                        symbol: other,
                        name: "Other".to_string(),
                        count: *count,
                    });
                }
            }
        }
    }
}
