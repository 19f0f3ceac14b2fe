//! POSIX single-quote quoting.
//!
//! Local commands are never run through a shell. Quoting is needed for the
//! command string `ssh` hands to the remote shell, and for printing an
//! invocation the way a user could paste it.

/// Characters that make `sh` treat a word as more than a literal.
const SHELL_META: &[char] = &[
    ' ', '\t', '\n', '\'', '"', '\\', '$', '`', '!', '*', '?', '[', ']', '(', ')', '{', '}', '<',
    '>', '|', '&', ';', '#', '~',
];

/// Body of a single-quoted word: each `'` closes the quote, emits `\'` and reopens.
pub fn escape_single_quote_content(value: &str) -> String {
    value.replace('\'', "'\\''")
}

/// `value` as one shell word, quoted only when it needs to be.
pub fn quote_arg(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }
    if !value.contains(SHELL_META) {
        return value.to_string();
    }
    quote_path(value)
}

pub fn quote_args(args: &[String]) -> String {
    args.iter()
        .map(|a| quote_arg(a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Always single-quoted.
pub fn quote_path(path: &str) -> String {
    format!("'{}'", escape_single_quote_content(path))
}

/// Like [`quote_path`], but a leading `~` or `~/` stays bare so the remote
/// shell still expands it to the login user's home directory.
pub fn quote_remote_path(path: &str) -> String {
    if path == "~" {
        return path.to_string();
    }
    match path.strip_prefix("~/") {
        Some("") => "~/".to_string(),
        Some(rest) => format!("~/{}", quote_path(rest)),
        None => quote_path(path),
    }
}
