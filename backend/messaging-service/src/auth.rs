use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Verified caller identity handed in by the authentication collaborator.
///
/// The transport layer validates the credential (JWT, session cookie, ...)
/// and builds one of these per request; this crate only cares whether a
/// stable identity is present. Every protected operation calls [`require`]
/// before touching the store.
///
/// [`require`]: AuthContext::require
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    identity: Option<Uuid>,
}

impl AuthContext {
    /// A context for a caller whose credential has been verified upstream.
    pub fn verified(identity: Uuid) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    /// A context for a request that carried no usable credential.
    pub fn anonymous() -> Self {
        Self { identity: None }
    }

    /// Build from the subject claim of an already-validated token. A subject
    /// that is not a well-formed identity yields an anonymous context, so the
    /// failure surfaces as `Unauthorized` at the first protected operation.
    pub fn from_subject(subject: &str) -> Self {
        match Uuid::parse_str(subject.trim()) {
            Ok(id) => Self::verified(id),
            Err(_) => {
                tracing::warn!(%subject, "token subject is not a valid identity");
                Self::anonymous()
            }
        }
    }

    pub fn require(&self) -> AppResult<Uuid> {
        self.identity.ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_context_yields_identity() {
        let id = Uuid::new_v4();
        assert_eq!(AuthContext::verified(id).require().unwrap(), id);
    }

    #[test]
    fn anonymous_context_is_unauthorized() {
        let err = AuthContext::anonymous().require().unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn malformed_subject_is_unauthorized() {
        let ctx = AuthContext::from_subject("not-a-uuid");
        assert!(matches!(ctx.require(), Err(AppError::Unauthorized)));
    }

    #[test]
    fn subject_round_trips() {
        let id = Uuid::new_v4();
        let ctx = AuthContext::from_subject(&id.to_string());
        assert_eq!(ctx.require().unwrap(), id);
    }
}
