//! Task domain enums shared across the workspace.

use serde::{Deserialize, Serialize};

/// Kind of conversion a task performs.
///
/// The wire/database representation matches the lowercase names used by
/// clients (`pdf2word`, `merge`, ...). Unknown values are a validation
/// error at the API boundary, not a runtime fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Pdf2Word,
    Pdf2Excel,
    Pdf2Ppt,
    Merge,
    Split,
}

impl TaskType {
    /// File extension of the conversion output.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::Pdf2Word => "docx",
            Self::Pdf2Excel => "xlsx",
            Self::Pdf2Ppt => "pptx",
            Self::Merge => "pdf",
            Self::Split => "pdf",
        }
    }

    /// All supported task types.
    pub fn all() -> [TaskType; 5] {
        [
            Self::Pdf2Word,
            Self::Pdf2Excel,
            Self::Pdf2Ppt,
            Self::Merge,
            Self::Split,
        ]
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pdf2Word => "pdf2word",
            Self::Pdf2Excel => "pdf2excel",
            Self::Pdf2Ppt => "pdf2ppt",
            Self::Merge => "merge",
            Self::Split => "split",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf2word" => Ok(Self::Pdf2Word),
            "pdf2excel" => Ok(Self::Pdf2Excel),
            "pdf2ppt" => Ok(Self::Pdf2Ppt),
            "merge" => Ok(Self::Merge),
            "split" => Ok(Self::Split),
            _ => Err(format!("Invalid task type: {s}")),
        }
    }
}

/// Lifecycle state of a task.
///
/// Transitions are monotonic: a task never re-enters `pending` after
/// leaving it, and `expired` is the only state a terminal task can still
/// move to. The database layer enforces this with compare-and-set updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Expired,
}

impl TaskStatus {
    /// Whether the worker lifecycle is finished for this task.
    ///
    /// `expired` is terminal too, but additionally excluded from every
    /// selection the sweeper makes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_wire_names() {
        for tt in TaskType::all() {
            let parsed: TaskType = tt.to_string().parse().unwrap();
            assert_eq!(parsed, tt);
            // serde representation matches Display
            let json = serde_json::to_string(&tt).unwrap();
            assert_eq!(json, format!("\"{tt}\""));
        }
    }

    #[test]
    fn task_type_rejects_unknown() {
        assert!("pdf2markdown".parse::<TaskType>().is_err());
        assert!(serde_json::from_str::<TaskType>("\"pdf2markdown\"").is_err());
    }

    #[test]
    fn output_extensions() {
        assert_eq!(TaskType::Pdf2Word.output_extension(), "docx");
        assert_eq!(TaskType::Pdf2Excel.output_extension(), "xlsx");
        assert_eq!(TaskType::Pdf2Ppt.output_extension(), "pptx");
        assert_eq!(TaskType::Merge.output_extension(), "pdf");
        assert_eq!(TaskType::Split.output_extension(), "pdf");
    }

    #[test]
    fn status_round_trip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Expired,
        ] {
            let parsed: TaskStatus = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
        assert!("queued".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Expired.is_terminal());
    }
}
