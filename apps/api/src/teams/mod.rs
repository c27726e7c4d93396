// Team membership mutations.
// Every roster change here is followed by a relationship sync for the
// affected member.

pub mod handlers;
pub mod membership;
