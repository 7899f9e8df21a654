//! Plain string templating over `{KEY}` placeholders. The HTML-to-PDF
//! rendering engine sits outside this system; all we produce is the markup.

pub fn render_template(template: &str, values: &[(&str, String)]) -> String {
    let mut html = template.to_string();
    for (key, value) in values {
        html = html.replace(&format!("{{{}}}", key), value);
    }
    html
}

/// Escape special characters so HTML-like extracted text shows literally.
pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

pub fn display_or_na(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.trim().is_empty() => escape_html(s),
        _ => "N/A".to_string(),
    }
}

pub fn number_or_na(value: Option<i64>) -> String {
    value.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Milliseconds as a human-friendly seconds string: 2072 -> "2.07",
/// 2000 -> "2". "N/A" when missing.
pub fn ms_to_seconds(ms: Option<i64>) -> String {
    match ms {
        Some(ms) => {
            let formatted = format!("{:.2}", ms as f64 / 1000.0);
            formatted.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        None => "N/A".to_string(),
    }
}

/// Duplicate the block between `start_marker` and `end_marker` once per
/// item. Markers absent leaves the template untouched.
pub fn render_indexed_block(
    html: &str,
    start_marker: &str,
    end_marker: &str,
    item_count: usize,
    render_row: impl Fn(usize, &str) -> String,
) -> String {
    let Some(start) = html.find(start_marker) else {
        return html.to_string();
    };
    let block_start = start + start_marker.len();
    let Some(end_offset) = html[block_start..].find(end_marker) else {
        return html.to_string();
    };
    let block_end = block_start + end_offset;

    let row_template = &html[block_start..block_end];
    let rows: String = (0..item_count).map(|i| render_row(i, row_template)).collect();

    format!("{}{}{}", &html[..start], rows, &html[block_end + end_marker.len()..])
}
