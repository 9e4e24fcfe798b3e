//! Path fragmentation
//!
//! A request path is consumed one segment at a time: the collection slug, then
//! an id or verb, then a sub-verb. Each step strips a leading `/` and splits at
//! the next one.

/// Split a path into its first segment and the remainder
///
/// The remainder is empty when no further `/` exists. Empty input yields two
/// empty fragments.
///
/// ```rust
/// use repo_rest::path::split_fragment;
///
/// assert_eq!(split_fragment("/people/123/archive"), ("people", "123/archive"));
/// assert_eq!(split_fragment("123"), ("123", ""));
/// assert_eq!(split_fragment(""), ("", ""));
/// ```
pub fn split_fragment(path: &str) -> (&str, &str) {
    let path = path.strip_prefix('/').unwrap_or(path);
    match path.split_once('/') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    }
}

/// The three routing fragments of a collection path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fragments<'a> {
    /// Collection slug
    pub slug: &'a str,
    /// Id or collection verb
    pub first: Option<&'a str>,
    /// Item verb
    pub second: Option<&'a str>,
    /// Anything beyond the third segment
    pub rest: &'a str,
}

impl<'a> Fragments<'a> {
    /// Decompose a path into slug, id-or-verb and sub-verb
    ///
    /// A fragment is present only when non-empty, so `/people/` has no
    /// first fragment.
    pub fn parse(path: &'a str) -> Self {
        let (slug, rest) = split_fragment(path);
        let (first, rest) = split_fragment(rest);
        let (second, rest) = split_fragment(rest);
        Self {
            slug,
            first: non_empty(first),
            second: non_empty(second),
            rest,
        }
    }
}

fn non_empty(fragment: &str) -> Option<&str> {
    (!fragment.is_empty()).then_some(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("/people"), ("people", ""));
        assert_eq!(split_fragment("/people/"), ("people", ""));
        assert_eq!(split_fragment("people/1"), ("people", "1"));
        assert_eq!(split_fragment("/"), ("", ""));
    }

    #[test]
    fn test_fragments_full() {
        let fragments = Fragments::parse("/people/ppl_1/archive");
        assert_eq!(fragments.slug, "people");
        assert_eq!(fragments.first, Some("ppl_1"));
        assert_eq!(fragments.second, Some("archive"));
        assert_eq!(fragments.rest, "");
    }

    #[test]
    fn test_fragments_trailing_slash_is_absent() {
        let fragments = Fragments::parse("/people/");
        assert_eq!(fragments.slug, "people");
        assert_eq!(fragments.first, None);
        assert_eq!(fragments.second, None);
    }

    #[test]
    fn test_fragments_extra_segments_kept_in_rest() {
        let fragments = Fragments::parse("/people/1/archive/now");
        assert_eq!(fragments.second, Some("archive"));
        assert_eq!(fragments.rest, "now");
    }

    #[test]
    fn test_fragments_empty() {
        assert_eq!(Fragments::parse(""), Fragments::default());
    }
}
