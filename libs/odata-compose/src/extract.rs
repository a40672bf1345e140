//! Raw option extraction from decoded query-string pairs.

use std::collections::BTreeMap;

use crate::config::UriResolverConfig;
use crate::kind::QueryOptionKind;

/// Reduce query-string pairs to `$`-prefixed options and `@` parameter aliases.
///
/// Keys are trimmed. With `enable_no_dollar_query_options`, known option names
/// are matched ignoring case and the `$` prefix; with `enable_case_insensitive`
/// alone, `$`-prefixed names are matched ignoring case. Either way they are
/// stored under their canonical `$name`. Unknown `$` keys are kept so the builder can report them;
/// everything else is dropped. Duplicates are not coalesced: the last pair wins.
pub fn extract_query_options<I, K, V>(
    pairs: I,
    resolver: &UriResolverConfig,
) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = BTreeMap::new();
    for (key, value) in pairs {
        let key = key.as_ref().trim();
        let value = value.as_ref();
        if key.starts_with('@') {
            out.insert(key.to_owned(), value.to_owned());
            continue;
        }
        match QueryOptionKind::resolve(key, resolver) {
            Some(kind) => {
                out.insert(kind.name().to_owned(), value.to_owned());
            }
            None if key.starts_with('$') => {
                out.insert(key.to_owned(), value.to_owned());
            }
            None => tracing::trace!(key, "not a system query option, skipped"),
        }
    }
    out
}

/// True if `name` is a system query option this crate understands.
#[must_use]
pub fn is_system_query_option(name: &str, resolver: &UriResolverConfig) -> bool {
    QueryOptionKind::resolve(name, resolver).is_some()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn keeps_dollar_keys_and_aliases_only() {
        let map = extract_query_options(
            [
                ("$filter", "Price gt @p"),
                ("@p", "10"),
                ("filter", "ignored"),
                ("page", "3"),
                ("$custom", "x"),
            ],
            &UriResolverConfig::default(),
        );
        assert_eq!(map.len(), 3);
        assert_eq!(map["$filter"], "Price gt @p");
        assert_eq!(map["@p"], "10");
        assert_eq!(map["$custom"], "x");
    }

    #[test]
    fn no_dollar_mode_normalizes_names() {
        let resolver = UriResolverConfig {
            enable_no_dollar_query_options: true,
            ..UriResolverConfig::default()
        };
        let pairs = [(" Top ", "5"), ("$ORDERBY", "Name"), ("page", "3")];
        let map = extract_query_options(pairs, &resolver);
        assert_eq!(map.get("$top").map(String::as_str), Some("5"));
        assert_eq!(map.get("$orderby").map(String::as_str), Some("Name"));
        assert!(!map.contains_key("page"));
    }

    #[test]
    fn case_insensitive_mode_normalizes_dollar_names() {
        let resolver = UriResolverConfig {
            enable_case_insensitive: true,
            ..UriResolverConfig::default()
        };
        let map = extract_query_options(
            [("$FILTER", "Price gt 10"), ("$Top", "2"), ("skip", "1")],
            &resolver,
        );
        assert_eq!(map.get("$filter").map(String::as_str), Some("Price gt 10"));
        assert_eq!(map.get("$top").map(String::as_str), Some("2"));
        assert!(!map.contains_key("$skip"));
        assert!(!map.contains_key("$FILTER"));
    }

    #[test]
    fn last_writer_wins() {
        let map = extract_query_options(
            [("$top", "1"), ("$top", "2")],
            &UriResolverConfig::default(),
        );
        assert_eq!(map["$top"], "2");
    }

    #[test]
    fn system_option_check_follows_resolver() {
        let strict = UriResolverConfig::default();
        assert!(is_system_query_option("$filter", &strict));
        assert!(!is_system_query_option("filter", &strict));
        assert!(!is_system_query_option("$Filter", &strict));

        let lenient = UriResolverConfig {
            enable_no_dollar_query_options: true,
            ..UriResolverConfig::default()
        };
        assert!(is_system_query_option("Filter", &lenient));

        let ci = UriResolverConfig {
            enable_case_insensitive: true,
            ..UriResolverConfig::default()
        };
        assert!(is_system_query_option("$Filter", &ci));
        assert!(!is_system_query_option("Filter", &ci));
    }
}
