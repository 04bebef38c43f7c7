//! Entity traits: identity + tenant ownership.

use crate::id::CompanyId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity that lives inside exactly one company (tenant).
///
/// Storage adapters use this to filter every lookup by the caller's company,
/// so a record owned by another tenant behaves exactly like a missing one.
pub trait TenantScoped {
    fn company_id(&self) -> CompanyId;

    fn belongs_to(&self, company_id: CompanyId) -> bool {
        self.company_id() == company_id
    }
}
