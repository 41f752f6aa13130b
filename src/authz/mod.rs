//! Authorization: the permission store and the per-route permission gate.
//!
//! Every protected route names one permission key. A caller passes when any
//! of their live roles is `admin` or links to that key through a live
//! permission row. Nothing is cached between requests.

mod gate;
pub mod store;

pub use gate::{enforce, PermissionGate, Requirement};
pub use store::{PermissionStore, SqlitePermissionStore};

/// Well-known role names
pub mod roles {
    /// Holders pass every permission check.
    pub const ADMIN: &str = "admin";
}

/// Permission keys checked by the HTTP routes
pub mod permissions {
    // Catalog lookups
    pub const CATALOG_PROGRAMS_READ: &str = "catalog.programs.read";
    pub const CATALOG_PROGRAMS_WRITE: &str = "catalog.programs.write";
    pub const CATALOG_PROGRAMS_DELETE: &str = "catalog.programs.delete";

    // Companies and brands
    pub const COMPANIES_READ: &str = "companies.read";
    pub const COMPANIES_WRITE: &str = "companies.write";
    pub const COMPANIES_DELETE: &str = "companies.delete";
    pub const BRANDS_READ: &str = "brands.read";
    pub const BRANDS_WRITE: &str = "brands.write";
    pub const BRANDS_DELETE: &str = "brands.delete";
    pub const BRAND_CATEGORIES_READ: &str = "brand.categories.read";
    pub const BRAND_CATEGORIES_WRITE: &str = "brand.categories.write";
    pub const BRAND_CATEGORIES_DELETE: &str = "brand.categories.delete";

    // Products
    pub const PRODUCTS_READ: &str = "products.read";
    pub const PRODUCTS_WRITE: &str = "products.write";
    pub const PRODUCTS_DELETE: &str = "products.delete";

    // Certificates attached to products
    pub const PRODUCT_CERTIFICATIONS_READ: &str = "product.certifications.read";
    pub const PRODUCT_CERTIFICATIONS_WRITE: &str = "product.certifications.write";
    pub const PRODUCT_CERTIFICATIONS_DELETE: &str = "product.certifications.delete";

    // RBAC
    pub const RBAC_ROLES_READ: &str = "rbac.roles.read";
    pub const RBAC_ROLES_WRITE: &str = "rbac.roles.write";
    pub const RBAC_ROLES_ASSIGN: &str = "rbac.roles.assign";
    pub const RBAC_PERMISSIONS_READ: &str = "rbac.permissions.read";
    pub const RBAC_PERMISSIONS_WRITE: &str = "rbac.permissions.write";
    pub const RBAC_USERS_ASSIGN_ROLE: &str = "rbac.users.assign_role";
}
