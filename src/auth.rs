//! Credentials and authorization primitives.
//!
//! Passwords are stored as salted, iterated BLAKE3 digests encoded as
//! `b3$<iterations>$<salt-hex>$<digest-hex>`. A [`Principal`] is the
//! authenticated caller; every platform operation that acts on behalf of
//! someone takes one and checks roles through it.

use std::collections::BTreeSet;
use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::AccessError;
use crate::user::{Role, User, UserId};

const SCHEME: &str = "b3";
const SALT_LEN: usize = 16;
/// Default number of hashing rounds.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Failed logins that trigger a security alert.
pub const FAILED_LOGIN_ALERT_THRESHOLD: u32 = 5;

/// An encoded password hash.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes `password` with a fresh random salt.
    #[must_use]
    pub fn generate(password: &str) -> Self {
        Self::generate_with_iterations(password, DEFAULT_ITERATIONS)
    }

    /// Hashes `password` with a fresh random salt and `iterations` rounds.
    #[must_use]
    pub fn generate_with_iterations(password: &str, iterations: u32) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = derive(password, &salt, iterations.max(1));
        Self(format!(
            "{SCHEME}${}${}${}",
            iterations.max(1),
            hex::encode(salt),
            digest.to_hex()
        ))
    }

    /// Wraps an already encoded hash (as stored on a [`User`]).
    #[must_use]
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Returns the encoded form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the hash, returning the encoded form.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Checks `password` against this hash. Malformed hashes never verify.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        let Some((iterations, salt, expected)) = self.parts() else {
            return false;
        };
        // blake3::Hash equality is constant-time.
        derive(password, &salt, iterations) == expected
    }

    fn parts(&self) -> Option<(u32, Vec<u8>, blake3::Hash)> {
        let mut fields = self.0.split('$');
        if fields.next()? != SCHEME {
            return None;
        }
        let iterations: u32 = fields.next()?.parse().ok()?;
        let salt = hex::decode(fields.next()?).ok()?;
        let digest = blake3::Hash::from_hex(fields.next()?).ok()?;
        if fields.next().is_some() || iterations == 0 {
            return None;
        }
        Some((iterations, salt, digest))
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();
    for _ in 1..iterations {
        let mut round = blake3::Hasher::new();
        round.update(salt);
        round.update(digest.as_bytes());
        digest = round.finalize();
    }
    digest
}

/// Where a user lands after logging in, by role hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingArea {
    /// Administrator console.
    Administrator,
    /// Professional dashboard.
    Professional,
    /// Student dashboard.
    Student,
    /// No role-specific area.
    Public,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user.
    pub user_id: UserId,
    /// Login name.
    pub username: String,
    /// Roles held at authentication time.
    pub roles: BTreeSet<Role>,
}

impl Principal {
    /// Builds a principal from a user record.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            roles: user.roles.clone(),
        }
    }

    /// Returns true if the principal holds `role`.
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Returns true if the principal holds any professional role.
    #[must_use]
    pub fn is_professional(&self) -> bool {
        self.roles.iter().any(|r| r.is_professional())
    }

    /// Requires `role`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::MissingRole` otherwise.
    pub fn require_role(&self, role: Role) -> Result<(), AccessError> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(AccessError::MissingRole { required: role })
        }
    }

    /// Requires at least one of `roles`.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::MissingRole` naming the first candidate.
    pub fn require_any_role(&self, roles: &[Role]) -> Result<(), AccessError> {
        if roles.iter().any(|r| self.has_role(*r)) {
            return Ok(());
        }
        Err(AccessError::MissingRole {
            required: roles.first().copied().unwrap_or(Role::Administrator),
        })
    }

    /// Requires a professional role.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::MissingRole` otherwise.
    pub fn require_professional(&self) -> Result<(), AccessError> {
        self.require_any_role(&[Role::Coach, Role::Nutritionist, Role::Psychologist])
    }

    /// Landing area for this principal.
    #[must_use]
    pub fn landing_area(&self) -> LandingArea {
        if self.has_role(Role::Administrator) {
            LandingArea::Administrator
        } else if self.is_professional() {
            LandingArea::Professional
        } else if self.has_role(Role::Student) {
            LandingArea::Student
        } else {
            LandingArea::Public
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[Role]) -> Principal {
        Principal {
            user_id: UserId::new(),
            username: "someone".to_string(),
            roles: roles.iter().copied().collect(),
        }
    }

    #[test]
    fn test_hash_verifies_correct_password() {
        let hash = PasswordHash::generate_with_iterations("123456", 8);
        assert!(hash.verify("123456"));
        assert!(!hash.verify("1234567"));
        assert!(hash.as_str().starts_with("b3$8$"));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = PasswordHash::generate_with_iterations("same", 4);
        let b = PasswordHash::generate_with_iterations("same", 4);
        assert_ne!(a, b);
        assert!(a.verify("same") && b.verify("same"));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!PasswordHash::from_encoded("plain-text").verify("plain-text"));
        assert!(!PasswordHash::from_encoded("b3$0$00$00").verify(""));
        assert!(!PasswordHash::from_encoded("b3$x$zz$zz").verify(""));
    }

    #[test]
    fn test_debug_does_not_leak() {
        let hash = PasswordHash::generate_with_iterations("pw", 2);
        assert_eq!(format!("{hash:?}"), "PasswordHash(..)");
    }

    #[test]
    fn test_landing_area_hierarchy() {
        assert_eq!(
            principal(&[Role::Administrator, Role::Student]).landing_area(),
            LandingArea::Administrator
        );
        assert_eq!(
            principal(&[Role::Coach, Role::Student]).landing_area(),
            LandingArea::Professional
        );
        assert_eq!(principal(&[Role::Student]).landing_area(), LandingArea::Student);
        assert_eq!(principal(&[]).landing_area(), LandingArea::Public);
    }

    #[test]
    fn test_role_requirements() {
        let coach = principal(&[Role::Coach]);
        assert!(coach.require_professional().is_ok());
        assert!(coach.require_role(Role::Administrator).is_err());
        assert!(coach.require_any_role(&[Role::Student, Role::Coach]).is_ok());

        let student = principal(&[Role::Student]);
        assert!(matches!(
            student.require_professional(),
            Err(AccessError::MissingRole { required: Role::Coach })
        ));
    }
}
