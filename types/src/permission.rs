use crate::settings::PermissionMode;

/// The user's answer to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionVerdict {
    Allow,
    Deny,
    AlwaysAllow,
}

impl PermissionVerdict {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, PermissionVerdict::Allow | PermissionVerdict::AlwaysAllow)
    }
}

/// Snapshot of the worker's permission state, exposed for `/permissions`
/// and `/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionContext {
    pub mode: PermissionMode,
    pub always_allowed: Vec<String>,
}
