pub mod coordinate;
pub mod driver;
pub mod notification;
pub mod request;
pub mod sos;
pub mod trip;
