/// Scheme prefixes stripped before classification. Order matters: the
/// `//` forms must be tried before their bare counterparts.
const SCHEME_PREFIXES: [&str; 4] = ["lightning://", "lightning:", "bitcoin://", "bitcoin:"];

/// Characters that survive copy/paste from rich text and must not reach the
/// decoders.
const SPACE_ARTIFACTS: [char; 4] = ['\u{00A0}', '\u{2007}', '\u{202F}', '\u{FEFF}'];

/// Strips the first matching scheme prefix and whitespace artifacts.
///
/// Only the first non-blank line of a multi-line paste is kept.
pub fn normalize(raw: &str) -> String {
    let line = raw
        .lines()
        .map(|line| line.replace(SPACE_ARTIFACTS, "").trim().to_string())
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    match SCHEME_PREFIXES
        .iter()
        .find(|prefix| has_prefix(&line, prefix))
    {
        Some(prefix) => line[prefix.len()..].trim().to_string(),
        None => line,
    }
}

/// Case-insensitive prefix check that never slices inside a char.
pub(crate) fn has_prefix(input: &str, prefix: &str) -> bool {
    input
        .get(..prefix.len())
        .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
}

/// Removes `prefix` (case-insensitive) if present.
pub(crate) fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    has_prefix(input, prefix).then(|| &input[prefix.len()..])
}
