/// Routing Modules
///
/// Splits the route table by access level:
/// - `public`: anonymous endpoints (health, registration, verification).
/// - `authenticated`: everything project-scoped, guarded by the AuthUser
///   extractor middleware. Per-project role checks happen inside the
///   handlers via the authorization engine, never in the router.
pub mod authenticated;
pub mod public;
