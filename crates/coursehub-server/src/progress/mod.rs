//! Per-user course progress and certificate issuance.
//!
//! The ledger records which units a user has watched and derives a
//! completion percentage from it. The certificate issuer guarantees at most
//! one certificate per `(user, course)`.

mod certificates;
mod ledger;

pub use certificates::CertificateIssuer;
pub use ledger::ProgressLedger;
