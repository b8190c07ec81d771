/// Parse a comma-separated token list into the set of USB event match tokens.
///
/// Tokens are trimmed and empty entries are dropped, so stray commas and
/// surrounding whitespace in the environment variable are harmless. An
/// all-whitespace input yields an empty set.
///
/// # Arguments
///
/// * `raw` - Comma-separated token list, e.g. "usblp,USB Bidirectional printer"
pub fn parse_match_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Check whether a kernel log line signals a USB printer event.
///
/// Matching is a plain case-sensitive substring test against each token.
/// An empty token set never matches anything.
pub fn line_matches(line: &str, tokens: &[String]) -> bool {
    tokens.iter().any(|token| line.contains(token.as_str()))
}
