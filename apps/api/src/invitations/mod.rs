// Token-addressed invitations.
// Team invitations add members (and so feed the relationship engine);
// mentor invitations create a single explicit mentor -> mentee edge.

pub mod acceptance;
pub mod handlers;
pub mod lifecycle;
pub mod store;
