pub mod invitation;
pub mod relationship;
pub mod team;
