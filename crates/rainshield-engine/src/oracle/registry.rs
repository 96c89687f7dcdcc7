//! Oracle registry

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use rainshield_common::{AuthorizationError, Height, Identity, NotFoundError, OracleName};

/// A single oracle registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRegistration {
    pub identity: Identity,
    pub name: OracleName,
    pub registered_at: Height,
    pub active: bool,
    /// Set by governance; blocks re-registration until reinstated
    #[serde(default)]
    pub revoked: bool,
}

/// Registrations keyed by identity; no history is kept
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleRegistry {
    registrations: HashMap<Identity, OracleRegistration>,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a registration, marking it active
    ///
    /// A revoked identity is refused until [`OracleRegistry::reinstate`] clears it.
    pub fn register(
        &mut self,
        identity: Identity,
        name: OracleName,
        height: Height,
    ) -> Result<OracleRegistration, AuthorizationError> {
        if self.registrations.get(&identity).is_some_and(|r| r.revoked) {
            return Err(AuthorizationError::RegistrationDenied(identity.to_string()));
        }

        let registration = OracleRegistration {
            identity: identity.clone(),
            name,
            registered_at: height,
            active: true,
            revoked: false,
        };
        self.registrations.insert(identity, registration.clone());
        Ok(registration)
    }

    /// Deactivate a registration and bar the identity from registering again
    pub fn revoke(&mut self, identity: &Identity) -> Result<(), NotFoundError> {
        let registration = self.require_mut(identity)?;
        registration.active = false;
        registration.revoked = true;
        Ok(())
    }

    /// Lift a revocation and reactivate the registration
    pub fn reinstate(&mut self, identity: &Identity) -> Result<&OracleRegistration, NotFoundError> {
        let registration = self.require_mut(identity)?;
        registration.active = true;
        registration.revoked = false;
        Ok(&*registration)
    }

    fn require_mut(&mut self, identity: &Identity) -> Result<&mut OracleRegistration, NotFoundError> {
        self.registrations
            .get_mut(identity)
            .ok_or_else(|| NotFoundError::Oracle(identity.to_string()))
    }

    /// Registered and active; absent identities are never approved
    pub fn is_approved(&self, identity: &Identity) -> bool {
        self.registrations
            .get(identity)
            .map(|r| r.active)
            .unwrap_or(false)
    }

    pub fn get(&self, identity: &Identity) -> Option<&OracleRegistration> {
        self.registrations.get(identity)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
