use std::io::{self, BufRead, Write};

/// Ask a yes/no question on the terminal.
pub fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    confirm_from(io::stdin().lock(), io::stdout(), prompt, default)
}

fn confirm_from<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    prompt: &str,
    default: Option<bool>,
) -> io::Result<bool> {
    let mut line = String::new();

    loop {
        line.clear();

        match default {
            Some(true) => write!(output, "{} (Y/n): ", prompt)?,
            Some(false) | None => write!(output, "{} (y/N): ", prompt)?,
        }
        output.flush()?;

        // Closed stdin counts as no
        if input.read_line(&mut line)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match line.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            _ => {}
        }
    }
}
