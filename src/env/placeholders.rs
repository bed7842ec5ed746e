use super::Environment;

/// Replaces `{NAME}` tokens with values from `env`.
///
/// Tokens that name no environment key, or that are not valid variable
/// names, stay in the output untouched. `\{` and `\}` produce literal braces.
pub fn expand_placeholders(input: &str, env: &Environment) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(&next) = chars.peek() {
                    match next {
                        '{' | '}' => {
                            output.push(next);
                            chars.next();
                        }
                        _ => {
                            output.push('\\');
                            output.push(next);
                            chars.next();
                        }
                    }
                } else {
                    output.push('\\');
                }
            }
            '{' => {
                let Some(&next_char) = chars.peek() else {
                    output.push('{');
                    continue;
                };
                if !is_start_char(next_char) {
                    output.push('{');
                    continue;
                }

                let mut key = String::new();
                let mut closed = false;
                while let Some(&next) = chars.peek() {
                    if next == '}' {
                        chars.next();
                        closed = true;
                        break;
                    }
                    if next == '{' {
                        break;
                    }
                    key.push(next);
                    chars.next();
                }

                let value = if closed && is_valid_key(&key) {
                    env.get_string(&key)
                } else {
                    None
                };

                match value {
                    Some(value) => output.push_str(&value),
                    None => {
                        output.push('{');
                        output.push_str(&key);
                        if closed {
                            output.push('}');
                        }
                    }
                }
            }
            _ => output.push(ch),
        }
    }

    output
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if is_start_char(c) => {}
        _ => return false,
    }

    for ch in chars {
        let valid = ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-');
        if !valid {
            return false;
        }
    }
    true
}

fn is_start_char(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
