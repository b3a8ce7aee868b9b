pub mod format;
pub mod mapper;
pub mod query;
pub mod window;
