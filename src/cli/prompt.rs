//! Line-based terminal prompts
//!
//! Every prompt returns `Ok(None)` when input reaches EOF so callers can
//! treat Ctrl-D as "cancel".

use std::io::{self, BufRead, Stdout, StdinLock, Write};
use zeroize::Zeroizing;

use crate::config::MIN_PASSWORD_LEN;

/// Environment variable that supplies the master password non-interactively
pub const PASSWORD_ENV: &str = "SSH_MANAGER_PASSWORD";

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn say(&mut self, message: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.output, "{}", message)
    }

    /// Print `label` and read one trimmed line
    pub fn line(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{} ", label)?;
        self.output.flush()?;

        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(buf.trim().to_string()))
    }

    /// Read a line, substituting `default` for empty input
    pub fn text(&mut self, label: &str, default: &str) -> io::Result<Option<String>> {
        let answer = self.line(&format!("{} ({})", label, default))?;
        Ok(answer.map(|a| if a.is_empty() { default.to_string() } else { a }))
    }

    /// Read a non-empty line, asking again until one is given
    pub fn required(&mut self, label: &str) -> io::Result<Option<String>> {
        loop {
            match self.line(label)? {
                None => return Ok(None),
                Some(answer) if answer.is_empty() => {
                    self.say(format!("{} cannot be empty", label.trim_end_matches(':')))?;
                }
                Some(answer) => return Ok(Some(answer)),
            }
        }
    }

    pub fn port(&mut self, label: &str, default: u16) -> io::Result<Option<u16>> {
        loop {
            let Some(answer) = self.text(label, &default.to_string())? else {
                return Ok(None);
            };
            match answer.parse::<u16>() {
                Ok(port) if port > 0 => return Ok(Some(port)),
                _ => self.say(format!("Invalid port: {}", answer))?,
            }
        }
    }

    /// Numbered selection. Empty input or EOF cancels.
    pub fn choose(&mut self, label: &str, items: &[String]) -> io::Result<Option<usize>> {
        self.say(label)?;
        for (i, item) in items.iter().enumerate() {
            self.say(format!("  {}) {}", i + 1, item))?;
        }

        loop {
            let Some(answer) = self.line(">")? else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=items.len()).contains(&n) => return Ok(Some(n - 1)),
                _ => {
                    if let Some(i) = items.iter().position(|item| *item == answer) {
                        return Ok(Some(i));
                    }
                    self.say(format!("Choose 1-{}", items.len()))?;
                }
            }
        }
    }

    pub fn confirm(&mut self, label: &str) -> io::Result<bool> {
        let answer = self.line(&format!("{} [y/N]", label))?;
        Ok(matches!(answer.as_deref(), Some("y") | Some("Y") | Some("yes")))
    }

    pub fn pause(&mut self, label: &str) -> io::Result<()> {
        self.line(label).map(|_| ())
    }
}

/// Check a master password against the length rule
pub fn check_master_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

/// Ask for the master password with hidden input.
///
/// When `creating` is set the password is asked twice. `SSH_MANAGER_PASSWORD`
/// short-circuits the prompt.
pub fn master_password(creating: bool) -> io::Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let label = if creating {
        "Create a master password: "
    } else {
        "Enter master password: "
    };

    loop {
        let first = Zeroizing::new(rpassword::prompt_password(label)?);
        if let Err(message) = check_master_password(&first) {
            eprintln!("{}", message);
            continue;
        }

        if creating {
            let second = Zeroizing::new(rpassword::prompt_password("Confirm master password: ")?);
            if *first != *second {
                eprintln!("Passwords do not match");
                continue;
            }
        }
        return Ok(first);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_line_and_eof() {
        let mut p = prompter("  hello \n");
        assert_eq!(p.line("Name:").unwrap().as_deref(), Some("hello"));
        assert_eq!(p.line("Name:").unwrap(), None);
    }

    #[test]
    fn test_required_reasks() {
        let mut p = prompter("\n\nweb\n");
        assert_eq!(p.required("Host:").unwrap().as_deref(), Some("web"));
        let out = String::from_utf8(p.output().clone()).unwrap();
        assert_eq!(out.matches("Host cannot be empty").count(), 2);
    }

    #[test]
    fn test_port_default_and_validation() {
        let mut p = prompter("\n");
        assert_eq!(p.port("Port:", 22).unwrap(), Some(22));

        let mut p = prompter("abc\n0\n2222\n");
        assert_eq!(p.port("Port:", 22).unwrap(), Some(2222));
    }

    #[test]
    fn test_choose_by_number_or_name() {
        let items = vec!["alpha".to_string(), "beta".to_string()];

        let mut p = prompter("2\n");
        assert_eq!(p.choose("Pick:", &items).unwrap(), Some(1));

        let mut p = prompter("9\nalpha\n");
        assert_eq!(p.choose("Pick:", &items).unwrap(), Some(0));

        let mut p = prompter("\n");
        assert_eq!(p.choose("Pick:", &items).unwrap(), None);
    }

    #[test]
    fn test_confirm() {
        assert!(prompter("y\n").confirm("Sure?").unwrap());
        assert!(!prompter("n\n").confirm("Sure?").unwrap());
        assert!(!prompter("").confirm("Sure?").unwrap());
    }

    #[test]
    fn test_check_master_password() {
        assert!(check_master_password("short").is_err());
        assert!(check_master_password("hunter2pass").is_ok());
    }
}
