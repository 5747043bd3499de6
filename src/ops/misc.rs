use crate::filter::Filter;

/// Fragments of `text` between matches of `filter`. With `include_match`,
/// the matched text itself is kept as its own fragment.
pub fn split_text(filter: &Filter, text: &str, include_match: bool) -> Vec<String> {
    let matches = filter.matches(text);
    if matches.is_empty() {
        return vec![text.to_owned()];
    }

    let mut fragments = Vec::with_capacity(matches.len() + 1);
    let mut last = 0;
    for m in &matches {
        fragments.push(text[last..m.start].to_owned());
        if include_match {
            fragments.push(text[m.start..m.end].to_owned());
        }
        last = m.end;
    }
    fragments.push(text[last..].to_owned());
    fragments
}

/// A short reference of the regex constructs the pattern options accept.
pub fn list_patterns() -> &'static [(&'static str, &'static str)] {
    &[
        (".", "any character except newline"),
        ("\\d \\w \\s", "digit, word character, whitespace"),
        ("\\D \\W \\S", "negations of the above"),
        ("[abc] [^abc] [a-z]", "character classes"),
        ("^ $", "start and end of line (of text without 'multiline')"),
        ("\\A \\z", "start and end of text"),
        ("\\b \\B", "word boundary and its negation"),
        ("* + ? {n,m}", "repetitions (greedy)"),
        ("*? +? ?? {n,m}?", "repetitions (lazy)"),
        ("a|b", "alternation"),
        ("(expr)", "capture group"),
        ("(?P<name>expr)", "named capture group"),
        ("(?:expr)", "non-capturing group"),
        ("(?i) (?m) (?s)", "inline flags: ignore case, multiline, dot-all"),
        ("\\Q...\\E", "not supported; use the 'escape' command instead"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_matches_by_default() {
        let filter = Filter::from_pattern(",").unwrap();
        assert_eq!(split_text(&filter, "a,b,c", false), vec!["a", "b", "c"]);
    }

    #[test]
    fn split_can_keep_matches() {
        let filter = Filter::from_pattern(r"\d+").unwrap();
        assert_eq!(
            split_text(&filter, "a12b3", true),
            vec!["a", "12", "b", "3", ""]
        );
    }

    #[test]
    fn split_without_match_returns_whole_input() {
        let filter = Filter::from_pattern("x").unwrap();
        assert_eq!(split_text(&filter, "abc", false), vec!["abc"]);
    }
}
