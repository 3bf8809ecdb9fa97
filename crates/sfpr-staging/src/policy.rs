use serde::{Deserialize, Serialize};

/// Automated approval rules applied at intake.
///
/// Metadata conflicts are never approved automatically, whatever the policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalPolicy {
    /// Approve `New` submissions without waiting for a maintainer.
    pub auto_approve_new: bool,
}

impl ApprovalPolicy {
    /// Policy that approves every new submission unattended.
    pub fn unattended() -> Self {
        Self {
            auto_approve_new: true,
        }
    }
}
