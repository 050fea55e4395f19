#![allow(clippy::module_name_repetitions)]
//! Small utilities: shell quoting of argv for diagnostics, random socket suffixes.

pub mod id;

pub use id::random_suffix;

/// Render an argv the way a user would type it, for log lines.
pub fn shell_join<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = String::new();
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&shell_escape(arg.as_ref()));
    }
    line
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '=' | '.' | '/' | ':' | '@')
}

/// Quote `word` for a POSIX shell, leaving plain words untouched.
pub fn shell_escape(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_shell_safe) {
        return word.to_string();
    }
    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if c == '\'' {
            // close, emit a double-quoted quote, reopen
            quoted.push_str("'\"'\"'");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_escape_simple() {
        assert_eq!(shell_escape("abc-123_./:@"), "abc-123_./:@");
    }

    #[test]
    fn test_shell_escape_placeholder_and_quotes() {
        assert_eq!(shell_escape("{awsLogFilter}"), "'{awsLogFilter}'");
        assert_eq!(shell_escape("O'Reilly"), "'O'\"'\"'Reilly'");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn test_shell_join() {
        let args = vec!["grep".to_string(), "two words".to_string(), "-c".to_string()];
        assert_eq!(shell_join(&args), "grep 'two words' -c");
        assert_eq!(shell_join(["a", "b c"]), "a 'b c'");
        assert_eq!(shell_join(Vec::<String>::new()), "");
    }
}
