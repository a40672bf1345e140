//! System query option names and the bitset used for allow-lists and ignore-sets.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::config::UriResolverConfig;

/// One of the `OData` system query options understood by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryOptionKind {
    Filter,
    OrderBy,
    Top,
    Skip,
    Select,
    Expand,
    Count,
    Format,
    SkipToken,
    DeltaToken,
    Apply,
    Compute,
    Search,
}

impl QueryOptionKind {
    pub const ALL: [QueryOptionKind; 13] = [
        QueryOptionKind::Filter,
        QueryOptionKind::OrderBy,
        QueryOptionKind::Top,
        QueryOptionKind::Skip,
        QueryOptionKind::Select,
        QueryOptionKind::Expand,
        QueryOptionKind::Count,
        QueryOptionKind::Format,
        QueryOptionKind::SkipToken,
        QueryOptionKind::DeltaToken,
        QueryOptionKind::Apply,
        QueryOptionKind::Compute,
        QueryOptionKind::Search,
    ];

    /// Canonical `$`-prefixed query string key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            QueryOptionKind::Filter => "$filter",
            QueryOptionKind::OrderBy => "$orderby",
            QueryOptionKind::Top => "$top",
            QueryOptionKind::Skip => "$skip",
            QueryOptionKind::Select => "$select",
            QueryOptionKind::Expand => "$expand",
            QueryOptionKind::Count => "$count",
            QueryOptionKind::Format => "$format",
            QueryOptionKind::SkipToken => "$skiptoken",
            QueryOptionKind::DeltaToken => "$deltatoken",
            QueryOptionKind::Apply => "$apply",
            QueryOptionKind::Compute => "$compute",
            QueryOptionKind::Search => "$search",
        }
    }

    /// Exact (case-sensitive) lookup of a `$`-prefixed key.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Lookup ignoring ASCII case; the leading `$` is still required.
    #[must_use]
    pub fn from_name_ignore_case(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Key lookup under a resolver policy. No-dollar mode is the most lenient;
    /// case-insensitive mode still requires the `$`.
    #[must_use]
    pub fn resolve(name: &str, resolver: &UriResolverConfig) -> Option<Self> {
        if resolver.enable_no_dollar_query_options {
            Self::from_name_lenient(name)
        } else if resolver.enable_case_insensitive {
            Self::from_name_ignore_case(name)
        } else {
            Self::from_name(name)
        }
    }

    /// Lookup ignoring ASCII case and an optional leading `$`.
    #[must_use]
    pub fn from_name_lenient(name: &str) -> Option<Self> {
        let bare = name.strip_prefix('$').unwrap_or(name);
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name()[1..].eq_ignore_ascii_case(bare))
    }

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for QueryOptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of query options, used both as the validation allow-list and as the
/// caller's ignore-set during composition.
///
/// Deserializes from `"all"`, `"none"`, or a list of option names
/// (with or without the `$` prefix).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "AllowedQueryOptionsRepr", into = "Vec<String>")]
#[must_use]
pub struct AllowedQueryOptions(u32);

impl AllowedQueryOptions {
    pub const NONE: AllowedQueryOptions = AllowedQueryOptions(0);
    pub const SUPPORTED: AllowedQueryOptions = AllowedQueryOptions((1 << 13) - 1);

    pub fn of(kinds: &[QueryOptionKind]) -> Self {
        kinds.iter().fold(Self::NONE, |acc, k| acc | *k)
    }

    #[must_use]
    pub const fn contains(self, kind: QueryOptionKind) -> bool {
        self.0 & kind.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn with(self, kind: QueryOptionKind) -> Self {
        AllowedQueryOptions(self.0 | kind.bit())
    }

    pub const fn without(self, kind: QueryOptionKind) -> Self {
        AllowedQueryOptions(self.0 & !kind.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = QueryOptionKind> {
        QueryOptionKind::ALL
            .into_iter()
            .filter(move |k| self.contains(*k))
    }
}

impl From<QueryOptionKind> for AllowedQueryOptions {
    fn from(kind: QueryOptionKind) -> Self {
        AllowedQueryOptions(kind.bit())
    }
}

impl BitOr for AllowedQueryOptions {
    type Output = AllowedQueryOptions;

    fn bitor(self, rhs: Self) -> Self::Output {
        AllowedQueryOptions(self.0 | rhs.0)
    }
}

impl BitOr<QueryOptionKind> for AllowedQueryOptions {
    type Output = AllowedQueryOptions;

    fn bitor(self, rhs: QueryOptionKind) -> Self::Output {
        self.with(rhs)
    }
}

impl BitOrAssign for AllowedQueryOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for AllowedQueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(QueryOptionKind::name)).finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AllowedQueryOptionsRepr {
    Word(String),
    List(Vec<String>),
}

impl TryFrom<AllowedQueryOptionsRepr> for AllowedQueryOptions {
    type Error = String;

    fn try_from(repr: AllowedQueryOptionsRepr) -> Result<Self, Self::Error> {
        let names = match repr {
            AllowedQueryOptionsRepr::Word(w) if w.eq_ignore_ascii_case("all") => {
                return Ok(Self::SUPPORTED);
            }
            AllowedQueryOptionsRepr::Word(w) if w.eq_ignore_ascii_case("none") => {
                return Ok(Self::NONE);
            }
            AllowedQueryOptionsRepr::Word(w) => vec![w],
            AllowedQueryOptionsRepr::List(l) => l,
        };
        names.iter().try_fold(Self::NONE, |acc, name| {
            QueryOptionKind::from_name_lenient(name.trim())
                .map(|k| acc | k)
                .ok_or_else(|| format!("unknown query option: {name}"))
        })
    }
}

impl From<AllowedQueryOptions> for Vec<String> {
    fn from(set: AllowedQueryOptions) -> Self {
        set.iter().map(|k| k.name()[1..].to_owned()).collect()
    }
}
