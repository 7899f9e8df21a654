/// Normalize a business name into a filesystem-safe folder token: lowercase,
/// runs of anything non-alphanumeric collapse to a single `-`.
pub fn sanitize_folder_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(ch);
        } else {
            pending_separator = true;
        }
    }

    if out.is_empty() {
        "business".to_string()
    } else {
        out
    }
}

/// Folder name for a business. The first business to claim a normalized name
/// keeps it; later businesses with the same normalized name get their stable
/// id appended.
pub fn folder_name(name: &str, business_id: &str, has_earlier_twin: bool) -> String {
    let slug = sanitize_folder_name(name);
    if has_earlier_twin {
        format!("{}-{}", slug, sanitize_folder_name(business_id))
    } else {
        slug
    }
}
