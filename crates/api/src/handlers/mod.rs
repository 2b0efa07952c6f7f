pub mod race;
pub mod timer;
