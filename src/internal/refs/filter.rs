//! Reference name filters.
//!
//! Filters are a small tagged algebra rather than a trait object: leaves are
//! prefix and regexp matchers, and composite filters are built with union,
//! intersection and negation. Construction is cheap and the combinators are
//! directly testable.

use bstr::{BStr, BString};
use regex::bytes::Regex;

use crate::errors::GitError;

/// A predicate over reference names.
#[derive(Debug, Clone)]
pub enum ReferenceFilter {
    /// Matches every refname.
    All,
    /// Matches no refname.
    Nothing,
    /// Matches `prefix` itself and anything under `prefix/`.
    Prefix(BString),
    /// Matches refnames the pattern matches in full.
    Regexp(Regex),
    Union(Box<ReferenceFilter>, Box<ReferenceFilter>),
    Intersection(Box<ReferenceFilter>, Box<ReferenceFilter>),
    Negation(Box<ReferenceFilter>),
}

/// Whether a selection rule admits or vetoes the references it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Include,
    Exclude,
}

/// One top-level selection rule, as handed over by the command-line layer.
#[derive(Debug, Clone)]
pub struct SelectionRule {
    pub polarity: Polarity,
    pub filter: ReferenceFilter,
}

impl ReferenceFilter {
    pub fn prefix(prefix: impl Into<BString>) -> ReferenceFilter {
        ReferenceFilter::Prefix(prefix.into())
    }

    /// Compile a regexp filter. The pattern is anchored to the whole
    /// refname.
    pub fn regexp(pattern: &str) -> Result<ReferenceFilter, GitError> {
        let anchored = format!("^(?:{pattern})$");
        let re = Regex::new(&anchored)
            .map_err(|e| GitError::InvalidRegexp(pattern.to_string(), e.to_string()))?;
        Ok(ReferenceFilter::Regexp(re))
    }

    pub fn union(a: ReferenceFilter, b: ReferenceFilter) -> ReferenceFilter {
        ReferenceFilter::Union(Box::new(a), Box::new(b))
    }

    pub fn intersection(a: ReferenceFilter, b: ReferenceFilter) -> ReferenceFilter {
        ReferenceFilter::Intersection(Box::new(a), Box::new(b))
    }

    pub fn negation(f: ReferenceFilter) -> ReferenceFilter {
        ReferenceFilter::Negation(Box::new(f))
    }

    /// Widen `base` with an additional include rule: the result matches
    /// whatever `base` or `f` matches. An absent base matches nothing.
    pub fn include(base: Option<ReferenceFilter>, f: ReferenceFilter) -> ReferenceFilter {
        match base {
            None => f,
            Some(base) => ReferenceFilter::union(base, f),
        }
    }

    /// Narrow `base` with an exclude rule: the result matches whatever
    /// `base` matches except what `f` matches. An absent base matches
    /// everything.
    pub fn exclude(base: Option<ReferenceFilter>, f: ReferenceFilter) -> ReferenceFilter {
        let base = base.unwrap_or(ReferenceFilter::All);
        ReferenceFilter::intersection(base, ReferenceFilter::negation(f))
    }

    /// Build the top-level walk filter from ordered command-line rules.
    ///
    /// Exclusion takes precedence: a reference walks iff it matches the
    /// union of the include rules (every reference, when there are none) and
    /// none of the exclude rules.
    pub fn selection(rules: &[SelectionRule]) -> ReferenceFilter {
        let mut includes: Option<ReferenceFilter> = None;
        let mut excludes: Option<ReferenceFilter> = None;
        for rule in rules {
            let f = rule.filter.clone();
            match rule.polarity {
                Polarity::Include => includes = Some(ReferenceFilter::include(includes.take(), f)),
                Polarity::Exclude => {
                    excludes = Some(match excludes.take() {
                        None => f,
                        Some(prev) => ReferenceFilter::union(prev, f),
                    })
                }
            }
        }
        let base = includes.unwrap_or(ReferenceFilter::All);
        match excludes {
            None => base,
            Some(excludes) => {
                ReferenceFilter::intersection(base, ReferenceFilter::negation(excludes))
            }
        }
    }

    /// Test a refname against this filter.
    pub fn matches(&self, refname: &BStr) -> bool {
        match self {
            ReferenceFilter::All => true,
            ReferenceFilter::Nothing => false,
            ReferenceFilter::Prefix(prefix) => {
                let p: &[u8] = prefix.as_ref();
                let r: &[u8] = refname.as_ref();
                r.starts_with(p) && (r.len() == p.len() || p.is_empty() || r[p.len()] == b'/')
            }
            ReferenceFilter::Regexp(re) => re.is_match(refname.as_ref()),
            ReferenceFilter::Union(a, b) => a.matches(refname) || b.matches(refname),
            ReferenceFilter::Intersection(a, b) => a.matches(refname) && b.matches(refname),
            ReferenceFilter::Negation(f) => !f.matches(refname),
        }
    }
}

#[cfg(test)]
mod tests {
    use bstr::ByteSlice;

    use super::*;

    fn matches(f: &ReferenceFilter, name: &str) -> bool {
        f.matches(name.as_bytes().as_bstr())
    }

    /// Prefix filters only match at component boundaries.
    #[test]
    fn test_prefix_component_boundary() {
        let f = ReferenceFilter::prefix("refs/foo");
        assert!(matches(&f, "refs/foo"));
        assert!(matches(&f, "refs/foo/bar"));
        assert!(!matches(&f, "refs/foobar"));
        assert!(!matches(&f, "refs/fo"));
    }

    /// Regexp filters match the whole refname, not a substring.
    #[test]
    fn test_regexp_is_anchored() {
        let f = ReferenceFilter::regexp("refs/tags/release-.*").unwrap();
        assert!(matches(&f, "refs/tags/release-1"));
        assert!(!matches(&f, "refs/tags/release"));
        assert!(!matches(&f, "more/refs/tags/release-1"));
    }

    /// An invalid pattern is a configuration error.
    #[test]
    fn test_regexp_rejects_bad_pattern() {
        assert!(ReferenceFilter::regexp("refs/changes/(\\d{2}").is_err());
    }

    /// `include` on an absent base matches only the new rule; `exclude` on an
    /// absent base carves out of the universe.
    #[test]
    fn test_combinator_nil_semantics() {
        let inc = ReferenceFilter::include(None, ReferenceFilter::prefix("refs/heads"));
        assert!(matches(&inc, "refs/heads/main"));
        assert!(!matches(&inc, "refs/tags/v1"));

        let exc = ReferenceFilter::exclude(None, ReferenceFilter::prefix("refs/heads"));
        assert!(!matches(&exc, "refs/heads/main"));
        assert!(matches(&exc, "refs/tags/v1"));
    }

    /// Chained include/exclude combinators fold in declaration order.
    #[test]
    fn test_combinator_chain() {
        let f = ReferenceFilter::include(None, ReferenceFilter::prefix("refs/heads"));
        let f = ReferenceFilter::exclude(Some(f), ReferenceFilter::prefix("refs/heads/tmp"));
        let f = ReferenceFilter::include(Some(f), ReferenceFilter::prefix("refs/tags"));
        assert!(matches(&f, "refs/heads/main"));
        assert!(!matches(&f, "refs/heads/tmp/x"));
        assert!(matches(&f, "refs/tags/v1"));
        assert!(!matches(&f, "refs/notes/commits"));
    }

    /// With no rules at all, everything walks.
    #[test]
    fn test_selection_empty_walks_all() {
        let f = ReferenceFilter::selection(&[]);
        assert!(matches(&f, "refs/heads/main"));
        assert!(matches(&f, "refs/anything"));
    }

    /// Exclusion beats inclusion regardless of rule order.
    #[test]
    fn test_selection_exclusion_precedence() {
        let rules = vec![
            SelectionRule {
                polarity: Polarity::Exclude,
                filter: ReferenceFilter::prefix("refs/heads/foo"),
            },
            SelectionRule {
                polarity: Polarity::Include,
                filter: ReferenceFilter::regexp(".*foo.*").unwrap(),
            },
        ];
        let f = ReferenceFilter::selection(&rules);
        assert!(!matches(&f, "refs/heads/foo"));
        assert!(matches(&f, "refs/barfoo"));
    }
}
