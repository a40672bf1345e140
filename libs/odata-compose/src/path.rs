//! Request resource path, reduced to what query composition needs.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    EntitySet(String),
    Singleton(String),
    Key(String),
    Navigation(String),
    Property(String),
    /// Trailing `/$count`.
    Count,
    /// Trailing `/$value`.
    Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct ODataPath {
    segments: Vec<PathSegment>,
}

impl ODataPath {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Path addressing a whole entity set: `/{name}`.
    pub fn entity_set(name: impl Into<String>) -> Self {
        Self::new(vec![PathSegment::EntitySet(name.into())])
    }

    pub fn push(mut self, segment: PathSegment) -> Self {
        self.segments.push(segment);
        self
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True when the terminal segment is `$count`.
    #[must_use]
    pub fn is_count_request(&self) -> bool {
        matches!(self.segments.last(), Some(PathSegment::Count))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn count_request_only_when_last() {
        let path = ODataPath::entity_set("Products").push(PathSegment::Count);
        assert!(path.is_count_request());

        let path = ODataPath::new(vec![
            PathSegment::Count,
            PathSegment::EntitySet("Products".to_owned()),
        ]);
        assert!(!path.is_count_request());
        assert!(!ODataPath::default().is_count_request());
    }
}
