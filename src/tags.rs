//! Tag conversion
//!
//! Tag-append operations accept either a single tag or a sequence of tags;
//! both forms yield the same resulting tag set.

/// Conversion into a batch of tags.
///
/// ```rust
/// use trueno_track::tags::IntoTags;
///
/// assert_eq!("baseline".into_tags(), vec!["baseline".to_string()]);
/// assert_eq!(
///     ["a", "b"].into_tags(),
///     vec!["a".to_string(), "b".to_string()]
/// );
/// ```
pub trait IntoTags {
    /// Convert into an ordered batch of tag strings.
    fn into_tags(self) -> Vec<String>;
}

impl IntoTags for &str {
    fn into_tags(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoTags for String {
    fn into_tags(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoTags for Vec<String> {
    fn into_tags(self) -> Vec<String> {
        self
    }
}

impl IntoTags for Vec<&str> {
    fn into_tags(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoTags for &[&str] {
    fn into_tags(self) -> Vec<String> {
        self.iter().map(|t| (*t).to_string()).collect()
    }
}

impl<const N: usize> IntoTags for [&str; N] {
    fn into_tags(self) -> Vec<String> {
        self.iter().map(|t| (*t).to_string()).collect()
    }
}
