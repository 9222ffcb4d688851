//! Column name normalization.

/// Normalizes a remote field name to a warehouse column name.
///
/// Lowercases, turns each run of characters outside `[a-z0-9_]` into a single
/// `_`, collapses repeated underscores and trims them from both ends. The
/// result may be empty when the name has no usable characters.
pub fn normalize_column_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !normalized.is_empty() {
                normalized.push('_');
            }
            pending_separator = false;
            normalized.push(c);
        } else {
            pending_separator = true;
        }
    }
    normalized
}

/// Whether column `column` carries values for the field named `field`.
///
/// Matches the normalized field name, or the same name with a `_list` suffix.
pub fn column_matches_field(column: &str, field: &str) -> bool {
    let column = normalize_column_name(column);
    let field = normalize_column_name(field);
    if field.is_empty() {
        return false;
    }
    column == field || column.strip_suffix("_list") == Some(field.as_str())
}
