//! Panorama naming

/// Name of the panorama stitched from `names`: `"{first}-{last}"` of the
/// lexicographically sorted names.
///
/// Input order does not matter. An empty slice yields an empty string.
pub fn sequence_identity<S: AsRef<str>>(names: &[S]) -> String {
    let first = names.iter().map(AsRef::as_ref).min();
    let last = names.iter().map(AsRef::as_ref).max();

    match (first, last) {
        (Some(first), Some(last)) => format!("{first}-{last}"),
        _ => String::new(),
    }
}
