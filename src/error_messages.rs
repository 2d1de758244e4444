/// Error Messages with Solutions
///
/// Renders `TuneError` for the terminal with the likely cause and what to try next
use crate::TuneError;
use console::style;

pub trait ErrorWithSolution {
    fn with_solution(&self) -> String;
}

fn render(title: &str, details: &str, causes: &[&str], solutions: &[&str]) -> String {
    let mut out = format!(
        "{} {}\n\n{}\n{}",
        style("❌ Error:").red().bold(),
        style(title).bold(),
        style("Details:").yellow(),
        details
    );

    for cause in causes {
        out.push_str(&format!("\n  • {}", cause));
    }

    out.push_str(&format!("\n\n{}", style("💡 Solutions:").green().bold()));
    for (i, solution) in solutions.iter().enumerate() {
        out.push_str(&format!(
            "\n  {} {}",
            style(format!("{}.", i + 1)).cyan().bold(),
            solution
        ));
    }
    out
}

impl ErrorWithSolution for TuneError {
    fn with_solution(&self) -> String {
        match self {
            TuneError::StorageUnavailable(msg) => render(
                "Preference storage unavailable",
                msg,
                &["Config directory is read-only", "Disk is full"],
                &[
                    "Check permissions on ~/.config/tunectl",
                    "Point storage_dir in config.toml at a writable directory",
                ],
            ),
            TuneError::Serialization(msg) => render(
                "Could not encode preferences",
                msg,
                &["Preference file was edited by hand"],
                &["Run: tunectl prefs reset"],
            ),
            TuneError::ProfileNotFound(name) => render(
                "Profile not found",
                name,
                &["Profile was never saved", "Name is misspelled"],
                &[
                    "List saved profiles: tunectl profile list",
                    "Save the current settings: tunectl profile save <name>",
                ],
            ),
            TuneError::InvalidProfileName(name) => render(
                "Invalid profile name",
                name,
                &["Names must be non-empty and must not contain '.'"],
                &["Pick a name like \"battery\" or \"performance\""],
            ),
            TuneError::InvalidVoltage(msg) => render(
                "Invalid voltage",
                msg,
                &["Voltage strings are space-separated integer steps"],
                &["Example: tunectl voltage rails \"38 40 42\""],
            ),
            TuneError::ConfigError(msg) => {
                let check = format!("Check {}", crate::config::AppConfig::config_path().display());
                render("Configuration error", msg, &[], &[check.as_str()])
            }
        }
    }
}

/// Print error with solution
pub fn print_error_with_solution(error: &TuneError) {
    eprintln!("\n{}\n", error.with_solution());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_solution() {
        let error = TuneError::ProfileNotFound("battery".to_string());
        let msg = error.with_solution();
        assert!(msg.contains("Profile not found"));
        assert!(msg.contains("battery"));
        assert!(msg.contains("tunectl profile list"));
    }

    #[test]
    fn test_every_variant_has_solutions() {
        let errors = [
            TuneError::StorageUnavailable("x".into()),
            TuneError::Serialization("x".into()),
            TuneError::InvalidProfileName("a.b".into()),
            TuneError::InvalidVoltage("x".into()),
            TuneError::ConfigError("x".into()),
        ];
        for error in errors {
            assert!(error.with_solution().contains("Solutions"));
        }
    }
}
