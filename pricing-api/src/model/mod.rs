pub mod delivery;
pub mod environment;
pub mod instrument;
pub mod record;
pub mod submission;
