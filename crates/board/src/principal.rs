#![forbid(unsafe_code)]

use kb_core::ids::PrincipalId;
use std::sync::{PoisonError, RwLock};

/// Supplies the signed-in principal. Every remote-touching board operation is
/// gated on it.
pub trait PrincipalProvider: Send + Sync {
    fn current_principal_id(&self) -> Option<PrincipalId>;
}

#[derive(Debug, Default)]
pub struct SessionPrincipal {
    current: RwLock<Option<PrincipalId>>,
}

impl SessionPrincipal {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(principal: PrincipalId) -> Self {
        Self {
            current: RwLock::new(Some(principal)),
        }
    }

    pub fn sign_in(&self, principal: PrincipalId) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(principal);
    }

    pub fn sign_out(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl PrincipalProvider for SessionPrincipal {
    fn current_principal_id(&self) -> Option<PrincipalId> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
