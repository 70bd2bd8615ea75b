pub mod block;
pub mod global;
pub mod variants;

/// The spelling-variant test shared by the global and block correctors: the
/// error token must be one edit away from the standard, or two edits that
/// collapse into a single transposition.
pub(crate) fn is_single_edit_variant(standard: &str, error: &str) -> bool {
    let standard = standard.to_lowercase();
    let error = error.to_lowercase();
    match strsim::levenshtein(&standard, &error) {
        1 => true,
        2 => strsim::damerau_levenshtein(&standard, &error) == 1,
        _ => false,
    }
}
