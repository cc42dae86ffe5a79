//! Detector prompt construction.

/// Join labels into a single open-vocabulary detector prompt.
///
/// Blank and repeated labels (case-insensitive) are skipped; `prefixes` are
/// placed first and are meant for the opening attempt only. Labels keep the
/// order in which they were supplied.
pub fn build_prompt<'a, I>(prefixes: &'a [String], labels: I, separator: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut parts: Vec<&str> = Vec::new();
    for part in prefixes.iter().map(String::as_str).chain(labels) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        parts.push(trimmed);
    }
    parts.join(separator)
}
