pub mod assignment;
pub mod lifecycle;
pub mod matching;
pub mod reservation;
pub mod sos;
