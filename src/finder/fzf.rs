use std::io::Write;
use std::process::{Command, Stdio};

/// Result of a picker session
#[derive(Debug, PartialEq, Eq)]
pub enum PickResult {
    /// User selected an entry
    Selected(String),
    /// User cancelled (Esc)
    Cancelled,
    /// fzf not found or error
    Error(String),
}

pub fn fzf_available() -> bool {
    Command::new("fzf").arg("--version").output().is_ok()
}

/// Spawn fzf over `choices` and return the picked one
pub fn pick(prompt: &str, choices: &[String]) -> PickResult {
    if !fzf_available() {
        return PickResult::Error("fzf not found".to_string());
    }

    let prompt_arg = format!("--prompt={prompt}: ");
    let mut child = match Command::new("fzf")
        .args(["--height=40%", "--layout=reverse", "--border", prompt_arg.as_str()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit()) // Let fzf display its UI
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return PickResult::Error(format!("Failed to spawn fzf: {}", e)),
    };

    if let Some(mut stdin) = child.stdin.take() {
        for choice in choices {
            let _ = writeln!(stdin, "{}", choice);
        }
    }

    let output = match child.wait_with_output() {
        Ok(output) => output,
        Err(e) => return PickResult::Error(format!("fzf error: {}", e)),
    };

    if output.status.success() {
        resolve(&String::from_utf8_lossy(&output.stdout), choices)
    } else {
        // fzf returns non-zero when user cancels with Esc
        PickResult::Cancelled
    }
}

/// Map picker output back onto the offered choices
fn resolve(selected: &str, choices: &[String]) -> PickResult {
    let selected = selected.trim_end_matches(['\r', '\n']);
    if selected.is_empty() {
        return PickResult::Cancelled;
    }
    match choices.iter().find(|c| c.as_str() == selected) {
        Some(choice) => PickResult::Selected(choice.clone()),
        None => PickResult::Error(format!("unexpected selection `{selected}`")),
    }
}

/// Answer to a numbered prompt: an index (1-based) or an exact name
pub fn resolve_answer(answer: &str, choices: &[String]) -> PickResult {
    let answer = answer.trim();
    if answer.is_empty() {
        return PickResult::Cancelled;
    }
    if let Ok(n) = answer.parse::<usize>() {
        return match n.checked_sub(1).and_then(|i| choices.get(i)) {
            Some(choice) => PickResult::Selected(choice.clone()),
            None => PickResult::Error(format!("no entry numbered {n}")),
        };
    }
    resolve(answer, choices)
}
