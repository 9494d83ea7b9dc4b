//! Static tool registry
//!
//! Each tool declares its name, permitted phases, mutating flag, and typed
//! parameter schema, all built once at startup. The dispatcher is the sole
//! authority validating calls against this table.

use std::collections::HashMap;
use std::sync::OnceLock;

use forge_core::Phase;

/// Every invocable tool, grouped by workflow category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    // File
    ListFiles,
    ReadFile,
    WriteFile,
    ApplyPatch,
    DeleteFile,
    RenameFile,
    RestoreFile,
    ResetAll,
    // Shell
    RunInBashSession,
    FrontendVerificationInstructions,
    FrontendVerificationComplete,
    // Planning
    SetPlan,
    PlanStepComplete,
    RequestPlanReview,
    RecordUserApprovalForPlan,
    PreCommitInstructions,
    RecordMemory,
    // Communication
    MessageUser,
    RequestUserInput,
    Submit,
    Done,
    // Research
    WebSearch,
    ViewTextWebsite,
    // Git
    MakeCommit,
    WatchPrCiStatus,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListFiles => "list_files",
            Self::ReadFile => "read_file",
            Self::WriteFile => "write_file",
            Self::ApplyPatch => "apply_patch",
            Self::DeleteFile => "delete_file",
            Self::RenameFile => "rename_file",
            Self::RestoreFile => "restore_file",
            Self::ResetAll => "reset_all",
            Self::RunInBashSession => "run_in_bash_session",
            Self::FrontendVerificationInstructions => "frontend_verification_instructions",
            Self::FrontendVerificationComplete => "frontend_verification_complete",
            Self::SetPlan => "set_plan",
            Self::PlanStepComplete => "plan_step_complete",
            Self::RequestPlanReview => "request_plan_review",
            Self::RecordUserApprovalForPlan => "record_user_approval_for_plan",
            Self::PreCommitInstructions => "pre_commit_instructions",
            Self::RecordMemory => "record_memory",
            Self::MessageUser => "message_user",
            Self::RequestUserInput => "request_user_input",
            Self::Submit => "submit",
            Self::Done => "done",
            Self::WebSearch => "web_search",
            Self::ViewTextWebsite => "view_text_website",
            Self::MakeCommit => "make_commit",
            Self::WatchPrCiStatus => "watch_pr_ci_status",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameter value type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
    StringArray,
}

/// One named, typed parameter in a tool schema
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Registry entry: schema, phase set, mutating flag
#[derive(Debug, Clone, Copy)]
pub struct ToolDescriptor {
    pub name: ToolName,
    pub phases: &'static [Phase],
    pub mutating: bool,
    pub params: &'static [ParamSpec],
}

const READ_PHASES: &[Phase] = &[Phase::Orient, Phase::Plan, Phase::Execute, Phase::Verify];
const RESEARCH_PHASES: &[Phase] = &[Phase::Orient, Phase::Plan, Phase::Execute];
const COMM_PHASES: &[Phase] = &[
    Phase::Orient,
    Phase::Plan,
    Phase::Execute,
    Phase::Verify,
    Phase::Submit,
];
const DRAFT_PHASES: &[Phase] = &[Phase::Orient, Phase::Plan];
const PLAN_ONLY: &[Phase] = &[Phase::Plan];
const EXECUTE_ONLY: &[Phase] = &[Phase::Execute];
const SHELL_PHASES: &[Phase] = &[Phase::Execute, Phase::Verify];
const VERIFY_ONLY: &[Phase] = &[Phase::Verify];
const CHECKLIST_PHASES: &[Phase] = &[Phase::Verify, Phase::Submit];
const SUBMIT_ONLY: &[Phase] = &[Phase::Submit];

static DESCRIPTORS: &[ToolDescriptor] = &[
    // -- File -----------------------------------------------------------
    ToolDescriptor {
        name: ToolName::ListFiles,
        phases: READ_PHASES,
        mutating: false,
        params: &[ParamSpec::optional("path", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::ReadFile,
        phases: READ_PHASES,
        mutating: false,
        params: &[ParamSpec::required("path", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::WriteFile,
        phases: EXECUTE_ONLY,
        mutating: true,
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::required("content", ParamKind::String),
        ],
    },
    ToolDescriptor {
        name: ToolName::ApplyPatch,
        phases: EXECUTE_ONLY,
        mutating: true,
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::required("diff", ParamKind::String),
        ],
    },
    ToolDescriptor {
        name: ToolName::DeleteFile,
        phases: EXECUTE_ONLY,
        mutating: true,
        params: &[ParamSpec::required("path", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::RenameFile,
        phases: EXECUTE_ONLY,
        mutating: true,
        params: &[
            ParamSpec::required("source", ParamKind::String),
            ParamSpec::required("destination", ParamKind::String),
        ],
    },
    ToolDescriptor {
        name: ToolName::RestoreFile,
        phases: EXECUTE_ONLY,
        mutating: true,
        params: &[ParamSpec::required("path", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::ResetAll,
        phases: EXECUTE_ONLY,
        mutating: true,
        params: &[],
    },
    // -- Shell ----------------------------------------------------------
    ToolDescriptor {
        name: ToolName::RunInBashSession,
        phases: SHELL_PHASES,
        mutating: true,
        params: &[ParamSpec::required("command", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::FrontendVerificationInstructions,
        phases: VERIFY_ONLY,
        mutating: false,
        params: &[],
    },
    ToolDescriptor {
        name: ToolName::FrontendVerificationComplete,
        phases: VERIFY_ONLY,
        mutating: false,
        params: &[ParamSpec::optional("notes", ParamKind::String)],
    },
    // -- Planning -------------------------------------------------------
    ToolDescriptor {
        name: ToolName::SetPlan,
        phases: DRAFT_PHASES,
        mutating: false,
        params: &[ParamSpec::required("steps", ParamKind::StringArray)],
    },
    ToolDescriptor {
        name: ToolName::PlanStepComplete,
        phases: EXECUTE_ONLY,
        mutating: false,
        params: &[
            ParamSpec::required("step_index", ParamKind::Integer),
            ParamSpec::required("summary", ParamKind::String),
        ],
    },
    ToolDescriptor {
        name: ToolName::RequestPlanReview,
        phases: PLAN_ONLY,
        mutating: false,
        params: &[],
    },
    ToolDescriptor {
        name: ToolName::RecordUserApprovalForPlan,
        phases: PLAN_ONLY,
        mutating: false,
        params: &[],
    },
    ToolDescriptor {
        name: ToolName::PreCommitInstructions,
        phases: CHECKLIST_PHASES,
        mutating: false,
        params: &[],
    },
    ToolDescriptor {
        name: ToolName::RecordMemory,
        phases: READ_PHASES,
        mutating: false,
        params: &[
            ParamSpec::required("key", ParamKind::String),
            ParamSpec::required("value", ParamKind::String),
        ],
    },
    // -- Communication --------------------------------------------------
    ToolDescriptor {
        name: ToolName::MessageUser,
        phases: COMM_PHASES,
        mutating: false,
        params: &[ParamSpec::required("message", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::RequestUserInput,
        phases: COMM_PHASES,
        mutating: false,
        params: &[ParamSpec::required("prompt", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::Submit,
        phases: SUBMIT_ONLY,
        mutating: true,
        params: &[ParamSpec::required("commit_message", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::Done,
        phases: SUBMIT_ONLY,
        mutating: false,
        params: &[ParamSpec::required("summary", ParamKind::String)],
    },
    // -- Research -------------------------------------------------------
    ToolDescriptor {
        name: ToolName::WebSearch,
        phases: RESEARCH_PHASES,
        mutating: false,
        params: &[
            ParamSpec::required("query", ParamKind::String),
            ParamSpec::optional("num_results", ParamKind::Integer),
        ],
    },
    ToolDescriptor {
        name: ToolName::ViewTextWebsite,
        phases: RESEARCH_PHASES,
        mutating: false,
        params: &[ParamSpec::required("url", ParamKind::String)],
    },
    // -- Git ------------------------------------------------------------
    ToolDescriptor {
        name: ToolName::MakeCommit,
        phases: SUBMIT_ONLY,
        mutating: true,
        params: &[ParamSpec::required("message", ParamKind::String)],
    },
    ToolDescriptor {
        name: ToolName::WatchPrCiStatus,
        phases: SUBMIT_ONLY,
        mutating: false,
        params: &[ParamSpec::required("pr_number", ParamKind::Integer)],
    },
];

/// The full registry, in declaration order
pub fn descriptors() -> &'static [ToolDescriptor] {
    DESCRIPTORS
}

/// Look up a descriptor by wire name
pub fn descriptor(name: &str) -> Option<&'static ToolDescriptor> {
    static INDEX: OnceLock<HashMap<&'static str, &'static ToolDescriptor>> = OnceLock::new();
    let index = INDEX.get_or_init(|| {
        DESCRIPTORS
            .iter()
            .map(|d| (d.name.as_str(), d))
            .collect()
    });
    index.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_25_tools_with_unique_names() {
        assert_eq!(descriptors().len(), 25);
        let mut names: Vec<_> = descriptors().iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 25);
    }

    #[test]
    fn test_lookup_by_name() {
        let desc = descriptor("write_file").unwrap();
        assert_eq!(desc.name, ToolName::WriteFile);
        assert!(desc.mutating);
        assert!(descriptor("launch_missiles").is_none());
    }

    #[test]
    fn test_orient_only_permits_non_mutating_tools() {
        for desc in descriptors() {
            if desc.phases.contains(&Phase::Orient) {
                assert!(
                    !desc.mutating,
                    "{} is mutating but available in orient",
                    desc.name
                );
            }
        }
    }

    #[test]
    fn test_terminal_phases_permit_nothing() {
        for desc in descriptors() {
            assert!(!desc.phases.contains(&Phase::Done), "{}", desc.name);
            assert!(!desc.phases.contains(&Phase::Failed), "{}", desc.name);
        }
    }

    #[test]
    fn test_mutating_set_matches_side_effecting_tools() {
        let mutating: Vec<_> = descriptors()
            .iter()
            .filter(|d| d.mutating)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            mutating,
            vec![
                "write_file",
                "apply_patch",
                "delete_file",
                "rename_file",
                "restore_file",
                "reset_all",
                "run_in_bash_session",
                "submit",
                "make_commit",
            ]
        );
    }
}
