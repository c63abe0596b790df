pub mod feed;
pub mod history;
