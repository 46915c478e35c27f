//! Shell-style command line splitting.
//!
//! Rules:
//! - whitespace separates tokens;
//! - `'...'` is taken literally;
//! - `"..."` is taken literally except that `\"` and `\\` are unescaped;
//! - outside quotes a backslash escapes a quote, a backslash or whitespace
//!   and is kept as-is before anything else, so `C:\bin\tool.exe` survives;
//! - quoted and unquoted pieces with no whitespace between them form one
//!   token, and `""` on its own is an empty token.

use warden_common::ConfigurationError;

/// Split `command` into an argument vector.
///
/// ```
/// use warden_spec::split_command_line;
///
/// let argv = split_command_line(r#""foo" bar "baz qux""#).unwrap();
/// assert_eq!(argv, vec!["foo", "bar", "baz qux"]);
/// ```
pub fn split_command_line(command: &str) -> Result<Vec<String>, ConfigurationError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(unterminated('\'', command)),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&next @ ('"' | '\\')) => {
                                current.push(next);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(c) => current.push(c),
                        None => return Err(unterminated('"', command)),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.peek() {
                    Some(&next) if is_escapable(next) => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push('\\'),
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    if tokens.is_empty() {
        return Err(ConfigurationError::EmptyCommand);
    }
    Ok(tokens)
}

fn is_escapable(c: char) -> bool {
    matches!(c, '"' | '\'' | '\\') || c.is_whitespace()
}

fn unterminated(quote: char, command: &str) -> ConfigurationError {
    ConfigurationError::UnterminatedQuote {
        quote,
        command: command.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(s: &str) -> Vec<String> {
        split_command_line(s).unwrap()
    }

    #[test]
    fn test_plain_words() {
        assert_eq!(split("sleep 10"), vec!["sleep", "10"]);
        assert_eq!(split("  a\t b\n c  "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted_runs_are_single_tokens() {
        assert_eq!(
            split(r#""foo" bar "baz qux""#),
            vec!["foo", "bar", "baz qux"]
        );
        assert_eq!(split("echo 'hello world'"), vec!["echo", "hello world"]);
        assert_eq!(
            split(r#"sh -c 'echo "$PATH"'"#),
            vec!["sh", "-c", r#"echo "$PATH""#]
        );
    }

    #[test]
    fn test_adjacent_pieces_join() {
        assert_eq!(split(r#"--name="a b"c"#), vec!["--name=a bc"]);
        assert_eq!(split(r#"'x'"y"z"#), vec!["xyz"]);
    }

    #[test]
    fn test_empty_quotes_make_empty_token() {
        assert_eq!(split(r#"prog "" ''"#), vec!["prog", "", ""]);
    }

    #[test]
    fn test_backslash_escapes() {
        assert_eq!(split(r#"a\ b"#), vec!["a b"]);
        assert_eq!(split(r#"say \"hi\""#), vec!["say", "\"hi\""]);
        assert_eq!(split(r#""in \"quotes\" \\ done""#), vec![r#"in "quotes" \ done"#]);
        // single quotes are literal
        assert_eq!(split(r#"'a\b'"#), vec![r#"a\b"#]);
    }

    #[test]
    fn test_windows_paths_survive() {
        assert_eq!(
            split(r#"C:\tools\svc.exe --dir "C:\Program Files\app""#),
            vec![r#"C:\tools\svc.exe"#, "--dir", r#"C:\Program Files\app"#]
        );
    }

    #[test]
    fn test_empty_command() {
        assert_eq!(split_command_line(""), Err(ConfigurationError::EmptyCommand));
        assert_eq!(
            split_command_line("   \t "),
            Err(ConfigurationError::EmptyCommand)
        );
    }

    #[test]
    fn test_unterminated_quotes() {
        assert!(matches!(
            split_command_line(r#"echo "oops"#),
            Err(ConfigurationError::UnterminatedQuote { quote: '"', .. })
        ));
        assert!(matches!(
            split_command_line("echo 'oops"),
            Err(ConfigurationError::UnterminatedQuote { quote: '\'', .. })
        ));
    }
}
