//! Environment variables a platform asks for after installation.

use serde_json::json;

use super::catalog::Platform;
use super::exec::{CommandExecutor, OutputMode};
use super::host::HostOs;
use super::template::{TemplateVars, render};
use crate::common::shell::shell_quote;
use crate::ui::prelude::*;

/// Appends to `PATH` instead of setting a variable of that name.
pub const PATH_APPEND: &str = "PATH_APPEND";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

impl Assignment {
    pub fn appends_to_path(&self) -> bool {
        self.name == PATH_APPEND
    }

    /// POSIX shell line that performs this assignment.
    pub fn export_line(&self) -> String {
        if self.appends_to_path() {
            format!("export PATH=\"$PATH:{}\"", self.value)
        } else {
            format!("export {}={}", self.name, shell_quote(&self.value))
        }
    }

    fn powershell(&self) -> String {
        let value = self.value.replace('\'', "''");
        if self.appends_to_path() {
            format!(
                "$p = [Environment]::GetEnvironmentVariable('Path', 'Machine'); \
                 if (($p -split ';') -notcontains '{value}') {{ \
                 [Environment]::SetEnvironmentVariable('Path', $p.TrimEnd(';') + ';{value}', 'Machine') }}"
            )
        } else {
            format!(
                "[Environment]::SetEnvironmentVariable('{}', '{value}', 'Machine')",
                self.name
            )
        }
    }
}

pub fn assignments(platform: &Platform, vars: &TemplateVars) -> Vec<Assignment> {
    platform
        .environment
        .iter()
        .map(|(name, template)| Assignment {
            name: name.clone(),
            value: render(template, vars),
        })
        .collect()
}

/// Apply the platform's environment. Windows gets machine-wide variables;
/// elsewhere the export lines are printed for the user's shell profile.
/// Failures are warnings, the installation itself already succeeded.
pub fn apply(platform: &Platform, vars: &TemplateVars, os: HostOs, executor: &dyn CommandExecutor) -> Vec<Assignment> {
    let assignments = assignments(platform, vars);
    if assignments.is_empty() {
        return assignments;
    }

    if os == HostOs::Windows {
        for assignment in &assignments {
            let args = vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                assignment.powershell(),
            ];
            match executor.run("powershell", &args, OutputMode::Silent) {
                Ok(0) => emit(
                    Level::Info,
                    "install.env.set",
                    &format!(
                        "{} Set {} (machine)",
                        char::from(NerdFont::Gear),
                        if assignment.appends_to_path() { "PATH" } else { assignment.name.as_str() }
                    ),
                    Some(json!({ "name": assignment.name, "value": assignment.value })),
                ),
                Ok(code) => warn_failed(assignment, &format!("exit code {code}")),
                Err(e) => warn_failed(assignment, &e.to_string()),
            }
        }
    } else {
        emit(
            Level::Info,
            "install.env.exports",
            &format!(
                "{} Add these lines to your shell profile:",
                char::from(NerdFont::Lightbulb)
            ),
            None,
        );
        for assignment in &assignments {
            emit(
                Level::Info,
                "install.env.export",
                &format!("  {}", assignment.export_line()),
                Some(json!({ "name": assignment.name, "value": assignment.value })),
            );
        }
    }
    assignments
}

fn warn_failed(assignment: &Assignment, reason: &str) {
    emit(
        Level::Warn,
        "install.env.failed",
        &format!(
            "{} Could not set {}: {}. Set it to '{}' manually.",
            char::from(NerdFont::Warning),
            assignment.name,
            reason,
            assignment.value
        ),
        None,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::testing::RecordingExecutor;

    fn platform() -> Platform {
        let mut platform = Platform::default();
        platform
            .environment
            .insert("GOROOT".into(), "{install_path}/go".into());
        platform
            .environment
            .insert(PATH_APPEND.into(), "{install_path}/go/bin".into());
        platform
    }

    fn vars() -> TemplateVars {
        TemplateVars::from([("install_path".to_string(), "/opt".to_string())])
    }

    #[test]
    fn renders_placeholders() {
        let list = assignments(&platform(), &vars());
        assert_eq!(
            list,
            vec![
                Assignment {
                    name: "GOROOT".into(),
                    value: "/opt/go".into()
                },
                Assignment {
                    name: PATH_APPEND.into(),
                    value: "/opt/go/bin".into()
                },
            ]
        );
    }

    #[test]
    fn export_lines() {
        let list = assignments(&platform(), &vars());
        assert_eq!(list[0].export_line(), "export GOROOT=/opt/go");
        assert_eq!(list[1].export_line(), "export PATH=\"$PATH:/opt/go/bin\"");
    }

    #[test]
    fn unix_runs_nothing() {
        let executor = RecordingExecutor::new();
        let applied = apply(&platform(), &vars(), HostOs::Linux, &executor);
        assert_eq!(applied.len(), 2);
        assert!(executor.commands().is_empty());
    }

    #[test]
    fn windows_sets_machine_variables_and_appends_path_once() {
        let executor = RecordingExecutor::new().with_exit("powershell", 1);
        let applied = apply(&platform(), &vars(), HostOs::Windows, &executor);
        assert_eq!(applied.len(), 2);

        let commands = executor.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].starts_with("powershell -NoProfile -Command"));
        assert!(commands[0].contains("GOROOT") && commands[0].contains("Machine"));
        assert!(commands[1].contains("-notcontains") && commands[1].contains("/opt/go/bin"));
    }
}
