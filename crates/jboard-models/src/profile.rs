//! User profile read models.
//!
//! Profiles are provisioned by the identity system and read-only here;
//! the backend resolves them when rendering posters and applicants.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::principal::Role;

/// Display-name sentinel for principals whose profile cannot be resolved.
/// Listings must always render a poster name, never null.
pub const UNKNOWN_POSTER: &str = "Unknown";

/// Stored user profile (`users/{user_id}`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserProfile {
    /// Identity-system user id (document id).
    pub user_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Trade/profession category for workers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserProfile {
    /// Name to render for this profile, with the sentinel fallback.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => UNKNOWN_POSTER,
        }
    }
}

/// Poster reference as rendered on the public job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PosterRef {
    pub id: String,
    pub name: String,
}

impl PosterRef {
    /// Resolve a poster id against an optional profile lookup result.
    pub fn resolve(id: impl Into<String>, profile: Option<&UserProfile>) -> Self {
        Self {
            id: id.into(),
            name: profile
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| UNKNOWN_POSTER.to_string()),
        }
    }
}

/// Applicant reference as rendered on the poster's applications view:
/// name, email, and trade category resolved from the worker's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerRef {
    pub id: String,
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl WorkerRef {
    /// Resolve a worker id against an optional profile lookup result.
    pub fn resolve(id: impl Into<String>, profile: Option<&UserProfile>) -> Self {
        match profile {
            Some(p) => Self {
                id: id.into(),
                name: p.display_name().to_string(),
                email: p.email.clone(),
                category: p.category.clone(),
            },
            None => Self {
                id: id.into(),
                name: UNKNOWN_POSTER.to_string(),
                email: None,
                category: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: Option<&str>) -> UserProfile {
        UserProfile {
            user_id: "u1".to_string(),
            name: name.map(String::from),
            email: Some("u1@example.com".to_string()),
            category: Some("electrician".to_string()),
            role: Some(Role::Worker),
        }
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(profile(Some("Ada")).display_name(), "Ada");
        assert_eq!(profile(None).display_name(), UNKNOWN_POSTER);
        assert_eq!(profile(Some("")).display_name(), UNKNOWN_POSTER);
    }

    #[test]
    fn test_poster_ref_unresolved_uses_sentinel() {
        let poster = PosterRef::resolve("ghost", None);
        assert_eq!(poster.name, "Unknown");
        assert_eq!(poster.id, "ghost");
    }

    #[test]
    fn test_worker_ref_resolution() {
        let p = profile(Some("Ada"));
        let resolved = WorkerRef::resolve("u1", Some(&p));
        assert_eq!(resolved.name, "Ada");
        assert_eq!(resolved.email.as_deref(), Some("u1@example.com"));
        assert_eq!(resolved.category.as_deref(), Some("electrician"));

        let unresolved = WorkerRef::resolve("ghost", None);
        assert_eq!(unresolved.name, UNKNOWN_POSTER);
        assert!(unresolved.email.is_none());
    }
}
