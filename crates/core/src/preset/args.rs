//! Free-text argument splitting for custom presets.

use super::types::PresetError;

/// Splits a free-text argument string into arguments.
///
/// Whitespace separates arguments. Single quotes keep their content literally,
/// double quotes allow `\"` and `\\` escapes, and a backslash outside quotes
/// escapes the next character.
pub fn split_arguments(text: &str) -> Result<Vec<String>, PresetError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(PresetError::UnterminatedQuote),
                    }
                }
            }
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(PresetError::UnterminatedQuote),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(PresetError::UnterminatedQuote),
                    }
                }
            }
            '\\' => {
                in_arg = true;
                match chars.next() {
                    Some(ch) => current.push(ch),
                    None => current.push('\\'),
                }
            }
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            c => {
                in_arg = true;
                current.push(c);
            }
        }
    }

    if in_arg {
        args.push(current);
    }

    Ok(args)
}
