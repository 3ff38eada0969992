//! Operation identifiers.
//!
//! An [`OperationId`] names an interceptable operation by owner type, member
//! and signature. Its string form is what entry consumers receive, and its
//! (owner, member) pair is what allowances are matched against.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies an interceptable operation.
///
/// # Example
///
/// ```
/// use stallwatch_core::OperationId;
///
/// let op = OperationId::new("std::thread::JoinHandle", "join", "()");
/// assert_eq!(op.to_string(), "std::thread::JoinHandle.join()");
///
/// let bare = OperationId::method("X", "join");
/// assert_eq!(bare.to_string(), "X.join");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId {
    owner: Cow<'static, str>,
    member: Cow<'static, str>,
    signature: Cow<'static, str>,
}

impl OperationId {
    /// Create an operation ID from owner, member and signature.
    pub fn new(
        owner: impl Into<Cow<'static, str>>,
        member: impl Into<Cow<'static, str>>,
        signature: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
            signature: signature.into(),
        }
    }

    /// Create an operation ID with an empty signature.
    pub fn method(
        owner: impl Into<Cow<'static, str>>,
        member: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(owner, member, "")
    }

    /// The owning type name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The member name.
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The signature, possibly empty.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// `owner.member` without the signature.
    pub fn qualified_member(&self) -> String {
        format!("{}.{}", self.owner, self.member)
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.member, self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_signature() {
        let op = OperationId::new("Future", "get", "(u64,Duration)");
        assert_eq!(op.to_string(), "Future.get(u64,Duration)");
        assert_eq!(op.qualified_member(), "Future.get");
    }

    #[test]
    fn test_equality_uses_all_parts() {
        let a = OperationId::new("Future", "get", "()");
        let b = OperationId::new("Future", "get", "(Duration)");
        assert_ne!(a, b);
        assert_eq!(a, OperationId::new(String::from("Future"), "get", "()"));
    }
}
