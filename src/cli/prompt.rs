//! Line-based prompts on stdin.

use anyhow::{Context, Result};
use std::io::Write;

pub const PASSWORD_ENV: &str = "DEGROW_PASSWORD";

/// Prints `label` and reads one trimmed line. Fails on end of input.
pub fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input)? == 0 {
        anyhow::bail!("Input closed");
    }
    Ok(input.trim().to_string())
}

/// Like [`prompt`] but blank input becomes `None`.
pub fn prompt_optional(label: &str) -> Result<Option<String>> {
    let value = prompt(label)?;
    Ok((!value.is_empty()).then_some(value))
}

/// Reads a password from the terminal without echoing it.
pub fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

/// Password from the environment if set, else prompted for.
pub fn password_from_env_or_prompt(label: &str) -> Result<String> {
    match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => prompt_password(label),
    }
}

/// Asks a yes/no question; anything but "y" or "yes" is no.
pub fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(&format!("{question} (y/N): "))?;
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Index of `input` in `options`, given as a 1-based number or a
/// case-insensitive name.
#[must_use]
pub fn match_choice(input: &str, options: &[String]) -> Option<usize> {
    let input = input.trim();
    if let Ok(number) = input.parse::<usize>() {
        return (1..=options.len()).contains(&number).then(|| number - 1);
    }
    options.iter().position(|o| o.eq_ignore_ascii_case(input))
}

/// Lists `options` and asks until one is picked. Blank input cancels.
pub fn choose(title: &str, options: &[String]) -> Result<Option<usize>> {
    println!("{title}");
    for (i, option) in options.iter().enumerate() {
        println!("  {:>2}. {option}", i + 1);
    }

    loop {
        let input = prompt("> ")?;
        if input.is_empty() {
            return Ok(None);
        }
        match match_choice(&input, options) {
            Some(index) => return Ok(Some(index)),
            None => println!("Enter a number between 1 and {} or a name.", options.len()),
        }
    }
}

/// Asks for a new password twice until both entries match.
pub fn new_password(label: &str) -> Result<String> {
    loop {
        let first = prompt_password(&format!("{label}: "))?;
        let second = prompt_password("Repeat password: ")?;
        if first == second {
            return Ok(first);
        }
        println!("Passwords do not match, try again.");
    }
}
