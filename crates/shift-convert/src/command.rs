//! Command-template converter.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;

use shift_core::{Error, Result, TaskType};

use crate::Converter;

/// Runs a configured external command per task type.
///
/// Templates are whitespace-split argument lists where the literal tokens
/// `{input}` and `{output}` are replaced with the source and destination
/// paths, e.g.:
///
/// `"libreoffice --headless --convert-to docx {input} --outdir {output}"`
#[derive(Debug, Clone)]
pub struct CommandConverter {
    commands: HashMap<TaskType, String>,
}

impl CommandConverter {
    pub fn new(commands: HashMap<TaskType, String>) -> Self {
        Self { commands }
    }

    /// Expand a template into (program, args) for the given paths.
    fn build_argv(template: &str, input: &Path, output: &Path) -> Result<Vec<String>> {
        let argv: Vec<String> = template
            .split_whitespace()
            .map(|tok| match tok {
                "{input}" => input.to_string_lossy().into_owned(),
                "{output}" => output.to_string_lossy().into_owned(),
                other => other.to_string(),
            })
            .collect();

        if argv.is_empty() {
            return Err(Error::conversion("empty command template"));
        }
        Ok(argv)
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, task_type: TaskType, input: &Path, output: &Path) -> Result<()> {
        let template = self
            .commands
            .get(&task_type)
            .ok_or_else(|| Error::UnsupportedTaskType(task_type.to_string()))?;

        let argv = Self::build_argv(template, input, output)?;
        let program = &argv[0];

        tracing::debug!(task_type = %task_type, program = %program, "Running converter");

        // The worker drops the in-flight future on its hard timeout; the
        // child must die with it.
        let output_result = Command::new(program)
            .args(&argv[1..])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::conversion(format!("failed to spawn {program}: {e}")))?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(Error::conversion(format!(
                "{program} exited with {}: {}",
                output_result.status,
                stderr.trim()
            )));
        }

        if !output.exists() {
            return Err(Error::conversion(format!(
                "{program} succeeded but produced no output file"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter_with(task_type: TaskType, template: &str) -> CommandConverter {
        let mut commands = HashMap::new();
        commands.insert(task_type, template.to_string());
        CommandConverter::new(commands)
    }

    #[test]
    fn argv_substitution() {
        let argv = CommandConverter::build_argv(
            "tool --convert {input} -o {output}",
            Path::new("/tmp/in.pdf"),
            Path::new("/tmp/out.docx"),
        )
        .unwrap();
        assert_eq!(argv, ["tool", "--convert", "/tmp/in.pdf", "-o", "/tmp/out.docx"]);
    }

    #[test]
    fn empty_template_rejected() {
        assert!(CommandConverter::build_argv("   ", Path::new("a"), Path::new("b")).is_err());
    }

    #[tokio::test]
    async fn unconfigured_type_fails_fast() {
        let converter = converter_with(TaskType::Pdf2Word, "cp {input} {output}");
        let err = converter
            .convert(TaskType::Merge, Path::new("/tmp/in"), Path::new("/tmp/out"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedTaskType(_)));
    }

    #[tokio::test]
    async fn copy_command_converts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.docx");
        std::fs::write(&input, b"pdf bytes").unwrap();

        let converter = converter_with(TaskType::Pdf2Word, "cp {input} {output}");
        converter
            .convert(TaskType::Pdf2Word, &input, &output)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"pdf bytes");
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"x").unwrap();

        // cp with a bogus destination directory fails with a message
        let converter = converter_with(TaskType::Pdf2Word, "cp {input} /nonexistent-dir/{output}");
        let err = converter
            .convert(
                TaskType::Pdf2Word,
                &input,
                &dir.path().join("out.docx"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }

    #[tokio::test]
    async fn timed_out_child_is_killed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 1\ntouch \"$2\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.docx");
        std::fs::write(&input, b"x").unwrap();

        let converter = converter_with(
            TaskType::Pdf2Word,
            &format!("{} {{input}} {{output}}", script.display()),
        );

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            converter.convert(TaskType::Pdf2Word, &input, &output),
        )
        .await;
        assert!(result.is_err());

        // long enough that a surviving child would have written its output
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn missing_output_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"x").unwrap();

        // `true` exits 0 without writing anything
        let converter = converter_with(TaskType::Pdf2Word, "true {input} {output}");
        let err = converter
            .convert(TaskType::Pdf2Word, &input, &dir.path().join("out.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }
}
