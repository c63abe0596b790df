pub mod backoff;
pub mod delivery;
pub mod dispatcher;
