use std::collections::HashSet;

/// Strips all HTML tags from input, leaving the text content escaped.
pub fn strip_all_html(input: &str) -> String {
    ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string()
}

/// Strips markup and turns the escaped text back into plain characters.
/// Guest text is shown verbatim, so `Tom & Ana` must not come back as `Tom &amp; Ana`.
pub fn strip_markup(input: &str) -> String {
    strip_all_html(input)
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

/// Display name as sent to the remote service: markup removed, inner runs of
/// whitespace collapsed, ends trimmed.
pub fn normalize_display_name(input: &str) -> String {
    strip_markup(input).split_whitespace().collect::<Vec<_>>().join(" ")
}
