//! Certificates attached to products.
//!
//! [`CertificationService`] manages the plain product/certification records.
//! [`ProgramCertificateService`] sits in front of it and refuses any write
//! where the product, the certification type and the requested program do
//! not share one program code. [`ProgramScope`] binds that engine to a single
//! program for a route group.

mod engine;
mod service;
mod sqlite;
mod store;

#[cfg(test)]
mod fake;

pub use engine::{ProgramCertificateService, ProgramScope};
pub use service::CertificationService;
pub use sqlite::SqliteCertificationRepository;
pub(crate) use sqlite::like_pattern;
pub use store::{CertificationStore, ProgramCertificateStore};
