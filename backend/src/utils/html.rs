// src/utils/html.rs

/// Sanitizes user-supplied rich text (unit text bodies, course descriptions).
///
/// Whitelist based: formatting tags such as `<b>` or `<p>` survive, while
/// `<script>`, `<iframe>` and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Sanitizes an optional field, mapping blank input to `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(clean_html)
}
