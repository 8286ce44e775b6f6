#![forbid(unsafe_code)]

//! Command-line tokenizer.
//!
//! Whitespace outside double quotes separates tokens. A double quote toggles
//! quoted mode, in which whitespace is literal; the quotes themselves are not
//! part of the token. An unterminated quote runs to end of line.

/// Split `line` into tokens.
///
/// ```
/// use draft_engine::tokenizer::tokenize;
///
/// assert_eq!(tokenize(r#"foo "bar baz" qux"#), ["foo", "bar baz", "qux"]);
/// assert!(tokenize("   ").is_empty());
/// ```
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Tokenize and split off the lowercased command name.
///
/// Returns `None` when the line has no tokens.
pub fn split_command(line: &str) -> Option<(String, Vec<String>)> {
    let mut tokens = tokenize(line).into_iter();
    let name = tokens.next()?.to_lowercase();
    Some((name, tokens.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn quoted_span_is_one_token() {
        assert_eq!(tokenize(r#"foo "bar baz" qux"#), ["foo", "bar baz", "qux"]);
    }

    #[test]
    fn empty_and_blank_lines() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t  ").is_empty());
        assert!(split_command("   ").is_none());
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        assert_eq!(tokenize(r#"text "hello world"#), ["text", "hello world"]);
    }

    #[test]
    fn empty_quotes_produce_nothing() {
        assert!(tokenize(r#""""#).is_empty());
        assert_eq!(tokenize(r#"a "" b"#), ["a", "b"]);
    }

    #[test]
    fn quotes_join_adjacent_text() {
        assert_eq!(tokenize(r#"ab"c d"e"#), ["abc de"]);
    }

    #[test]
    fn repeated_whitespace_collapses() {
        assert_eq!(tokenize("  line   0,0\t 10,10  "), ["line", "0,0", "10,10"]);
    }

    #[test]
    fn split_lowercases_only_the_name() {
        let (name, args) = split_command(r#"LINE "A B" Cd"#).unwrap();
        assert_eq!(name, "line");
        assert_eq!(args, ["A B", "Cd"]);
    }

    proptest! {
        #[test]
        fn unquoted_matches_split_whitespace(line in "[a-z0-9 \t,.]{0,40}") {
            let expected: Vec<String> =
                line.split_whitespace().map(str::to_string).collect();
            prop_assert_eq!(tokenize(&line), expected);
        }

        #[test]
        fn tokens_are_never_empty(line in "[a-z \"]{0,40}") {
            prop_assert!(tokenize(&line).iter().all(|t| !t.is_empty()));
        }
    }
}
