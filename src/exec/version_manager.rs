// src/exec/version_manager.rs

//! Wrapping commands in a version manager's `exec` subcommand.

use crate::exec::request::LanguageSpec;

/// Build `<tool> exec <lang>@<version> ... -- <command>`.
///
/// Languages without a name are skipped, a missing version becomes
/// `latest`, and an empty language list leaves the command untouched.
pub fn wrap_command(tool: &str, command: &str, languages: &[LanguageSpec]) -> String {
    if languages.is_empty() {
        return command.to_string();
    }

    let mut out = format!("{tool} exec");
    for lang in languages {
        let name = lang.name.trim();
        if name.is_empty() {
            continue;
        }
        let version = lang
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("latest");
        out.push(' ');
        out.push_str(name);
        out.push('@');
        out.push_str(version);
    }

    out.push_str(" -- ");
    out.push_str(command);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_with_versions_and_defaults() {
        let langs = vec![
            LanguageSpec::new("python", Some("3.12")),
            LanguageSpec::new("", Some("1")),
            LanguageSpec::new("node", None),
        ];
        assert_eq!(
            wrap_command("mise", "python main.py", &langs),
            "mise exec python@3.12 node@latest -- python main.py"
        );
    }

    #[test]
    fn no_languages_means_no_rewrite() {
        assert_eq!(wrap_command("mise", "echo hi", &[]), "echo hi");
    }
}
