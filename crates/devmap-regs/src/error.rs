//! Error types for register layout.

/// Errors that make a peripheral's register layout unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("register group '{0}' not found")]
    UnknownGroup(String),

    #[error("member {member} of {group} references unknown register group '{target}'")]
    UnknownGroupReference {
        group: String,
        member: String,
        target: String,
    },

    #[error("cyclic register group reference: {}", path.join(" -> "))]
    CyclicGroupReference { path: Vec<String> },

    #[error("{group}/{member} uses mode '{mode}', which the group does not declare")]
    UnknownModeReference {
        group: String,
        member: String,
        mode: String,
    },

    #[error("{group}{}: members need {required} bytes but the group declares {declared}", mode_suffix(mode))]
    LayoutOverflow {
        group: String,
        mode: Option<String>,
        declared: u64,
        required: u64,
    },

    #[error("{group}/{member} at offset 0x{offset:X} overlaps the previous member (cursor 0x{cursor:X})")]
    MemberOverlap {
        group: String,
        member: String,
        offset: u64,
        cursor: u64,
    },

    #[error("field {register}.{field} has a zero mask")]
    ZeroMask { register: String, field: String },

    #[error("field {register}.{field} mask 0x{mask:X} does not fit a {bits}-bit register")]
    FieldOutOfRange {
        register: String,
        field: String,
        mask: u64,
        bits: u64,
    },

    #[error("register {register} has size {size}; expected 1, 2, 4 or 8")]
    InvalidRegisterSize { register: String, size: u64 },
}

fn mode_suffix(mode: &Option<String>) -> String {
    mode.as_ref().map(|m| format!(" ({m})")).unwrap_or_default()
}

impl LayoutError {
    /// Short kind used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            LayoutError::UnknownGroup(_) => "unknown-group",
            LayoutError::UnknownGroupReference { .. } => "unknown-group-reference",
            LayoutError::CyclicGroupReference { .. } => "cyclic-group-reference",
            LayoutError::UnknownModeReference { .. } => "unknown-mode-reference",
            LayoutError::LayoutOverflow { .. } => "layout-overflow",
            LayoutError::MemberOverlap { .. } => "member-overlap",
            LayoutError::ZeroMask { .. } => "zero-mask",
            LayoutError::FieldOutOfRange { .. } => "field-out-of-range",
            LayoutError::InvalidRegisterSize { .. } => "invalid-register-size",
        }
    }
}
