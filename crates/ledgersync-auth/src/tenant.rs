//! Tenant resolver (component C11): maps an authenticated subject to a
//! tenant via an external, WorkOS-style directory service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// A single organization membership, as paginated from the directory
/// service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Membership {
    pub tenant_id: String,
    pub organization_name: String,
}

/// Result of resolving a subject's tenant membership(s).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TenantResolution {
    pub tenant_id: String,
    pub organization_name: Option<String>,
    pub requires_selection: bool,
    /// Populated only when `requires_selection` is true: every membership
    /// the client can choose between.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Membership>,
}

/// Queries an external directory service for a subject's organization
/// memberships, paginating until exhausted.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Returns every membership for `subject`, across all pages.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IdentityProvider`] if the directory service is
    /// unreachable or returns a malformed page.
    async fn list_memberships(&self, subject: &str) -> Result<Vec<Membership>, AuthError>;
}

/// Resolves a subject's tenant: zero memberships falls back to
/// `default_tenant_id`, exactly one resolves directly, and more than one
/// is returned as a selection list for the client to disambiguate.
///
/// # Errors
///
/// Returns [`AuthError::IdentityProvider`] if the directory lookup fails,
/// and [`AuthError::Configuration`] if there are zero memberships and no
/// default tenant is configured.
pub async fn resolve_tenant(
    directory: &dyn DirectoryService,
    subject: &str,
    default_tenant_id: Option<&str>,
) -> Result<TenantResolution, AuthError> {
    let mut memberships = directory.list_memberships(subject).await?;

    match memberships.len() {
        0 => {
            let tenant_id = default_tenant_id
                .ok_or_else(|| AuthError::configuration("no memberships and no default_tenant_id configured"))?
                .to_string();
            Ok(TenantResolution {
                tenant_id,
                organization_name: None,
                requires_selection: false,
                options: Vec::new(),
            })
        }
        1 => {
            let membership = memberships.remove(0);
            Ok(TenantResolution {
                tenant_id: membership.tenant_id,
                organization_name: Some(membership.organization_name),
                requires_selection: false,
                options: Vec::new(),
            })
        }
        _ => Ok(TenantResolution {
            tenant_id: String::new(),
            organization_name: None,
            requires_selection: true,
            options: memberships,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeDirectory {
        memberships: Vec<Membership>,
    }

    #[async_trait]
    impl DirectoryService for FakeDirectory {
        async fn list_memberships(&self, _subject: &str) -> Result<Vec<Membership>, AuthError> {
            Ok(self.memberships.clone())
        }
    }

    #[tokio::test]
    async fn zero_memberships_falls_back_to_default() {
        let directory = FakeDirectory { memberships: vec![] };
        let resolution = resolve_tenant(&directory, "sub", Some("default-tenant")).await.unwrap();
        assert_eq!(resolution.tenant_id, "default-tenant");
        assert!(!resolution.requires_selection);
    }

    #[tokio::test]
    async fn zero_memberships_without_default_errors() {
        let directory = FakeDirectory { memberships: vec![] };
        let result = resolve_tenant(&directory, "sub", None).await;
        assert!(matches!(result, Err(AuthError::Configuration { .. })));
    }

    #[tokio::test]
    async fn single_membership_resolves_directly() {
        let directory = FakeDirectory {
            memberships: vec![Membership {
                tenant_id: "t1".to_string(),
                organization_name: "Acme".to_string(),
            }],
        };
        let resolution = resolve_tenant(&directory, "sub", None).await.unwrap();
        assert_eq!(resolution.tenant_id, "t1");
        assert_eq!(resolution.organization_name.as_deref(), Some("Acme"));
        assert!(!resolution.requires_selection);
    }

    #[tokio::test]
    async fn multiple_memberships_require_selection() {
        let directory = FakeDirectory {
            memberships: vec![
                Membership {
                    tenant_id: "t1".to_string(),
                    organization_name: "Acme".to_string(),
                },
                Membership {
                    tenant_id: "t2".to_string(),
                    organization_name: "Globex".to_string(),
                },
            ],
        };
        let resolution = resolve_tenant(&directory, "sub", None).await.unwrap();
        assert!(resolution.requires_selection);
        assert_eq!(resolution.options.len(), 2);
    }
}
