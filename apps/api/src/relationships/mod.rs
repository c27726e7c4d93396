// Mentor/mentee relationship engine.
// Derives the directed mentor -> mentee graph from team membership and keeps
// it converged: on every membership write (driver) and on every read (normalizer).

pub mod driver;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod normalizer;
pub mod pg_store;
pub mod reconciler;
pub mod store;
pub mod verification;
