use learnhub_auth::{IdentityClaims, IdentityId, Role};
use learnhub_core::{CompanyId, ProfileId};
use learnhub_infra::Actor;
use learnhub_learning::{Company, UserProfile};

/// Authenticated identity for a request (token validated, profile not yet resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    identity: IdentityId,
    email: Option<String>,
    name: Option<String>,
}

impl IdentityContext {
    pub fn from_claims(claims: IdentityClaims) -> Self {
        Self {
            identity: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }

    pub fn identity(&self) -> &IdentityId {
        &self.identity
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Tenant context for a request: the caller's profile and company.
///
/// Built once by the tenant middleware and immutable afterwards; every
/// tenant-scoped handler receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    identity: IdentityId,
    profile: UserProfile,
    company: Company,
}

impl RequestContext {
    pub fn new(identity: IdentityId, profile: UserProfile, company: Company) -> Self {
        Self {
            identity,
            profile,
            company,
        }
    }

    pub fn identity(&self) -> &IdentityId {
        &self.identity
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn company(&self) -> &Company {
        &self.company
    }

    pub fn company_id(&self) -> CompanyId {
        self.company.id
    }

    pub fn profile_id(&self) -> ProfileId {
        self.profile.id
    }

    pub fn role(&self) -> Role {
        self.profile.role
    }

    pub fn actor(&self) -> Actor {
        Actor::from(&self.profile)
    }
}
