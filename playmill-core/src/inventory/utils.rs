use anyhow::Result;
use regex::Regex;

/// Translates a shell-style glob (`web*`, `db?`) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            c if "\\.+()[]{}|^$".contains(c) => {
                translated.push('\\');
                translated.push(c);
            }
            c => translated.push(c),
        }
    }
    translated.push('$');
    Ok(Regex::new(&translated)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run() {
        let re = glob_to_regex("web*.example.com").unwrap();
        assert!(re.is_match("web1.example.com"));
        assert!(re.is_match("web-staging.example.com"));
        assert!(!re.is_match("db1.example.com"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let re = glob_to_regex("web?").unwrap();
        assert!(re.is_match("web1"));
        assert!(!re.is_match("web12"));
    }

    #[test]
    fn literal_dots_do_not_match_everything() {
        let re = glob_to_regex("a.b").unwrap();
        assert!(re.is_match("a.b"));
        assert!(!re.is_match("axb"));
    }
}
