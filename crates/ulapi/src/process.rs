// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Command-line helpers: argument splitting and shell execution.

use crate::debug::diag;
use crate::error::{Error, Result};
use std::process::Command;

/// Split `src` into arguments.
///
/// Whitespace separates arguments except inside double quotes; the quote
/// characters themselves are dropped. An unterminated quote runs to the end
/// of the input.
///
/// ```
/// let argv = ulapi::process::to_argv(r#"prog -f "my file" x"#);
/// assert_eq!(argv, ["prog", "-f", "my file", "x"]);
/// ```
#[must_use]
pub fn to_argv(src: &str) -> Vec<String> {
    let mut argv = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quote = false;

    for c in src.chars() {
        if c == '"' {
            in_quote = !in_quote;
            in_token = true;
        } else if c.is_whitespace() && !in_quote {
            if in_token {
                argv.push(std::mem::take(&mut current));
                in_token = false;
            }
        } else {
            current.push(c);
            in_token = true;
        }
    }
    if in_token {
        argv.push(current);
    }
    argv
}

/// Run `cmd` through `/bin/sh -c` and return its exit code.
///
/// A child killed by a signal reports `128 + signal`, as shells do.
pub fn system(cmd: &str) -> Result<i32> {
    let status = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .status()
        .map_err(|e| {
            diag!("system", e);
            Error::Io(e)
        })?;

    if let Some(code) = status.code() {
        return Ok(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Ok(128 + signal);
        }
    }
    Err(Error::InvalidState(format!("no exit status for {:?}", cmd)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_argv_plain() {
        assert_eq!(to_argv("  a  bb\tccc \n"), ["a", "bb", "ccc"]);
        assert!(to_argv("").is_empty());
        assert!(to_argv("   ").is_empty());
    }

    #[test]
    fn test_to_argv_quotes() {
        assert_eq!(to_argv(r#"say "hello world" now"#), ["say", "hello world", "now"]);
        assert_eq!(to_argv(r#"a"b c"d"#), ["ab cd"]);
        assert_eq!(to_argv(r#"x """#), ["x", ""]);
    }

    #[test]
    fn test_to_argv_unterminated_quote() {
        assert_eq!(to_argv(r#"run "to the end"#), ["run", "to the end"]);
    }

    #[test]
    fn test_system_exit_codes() {
        assert_eq!(system("true").expect("true"), 0);
        assert_eq!(system("exit 3").expect("exit 3"), 3);
        assert_eq!(system("kill -9 $$").expect("killed"), 128 + 9);
    }
}
