pub mod ranking;
pub mod response;
pub mod retention;
pub mod signals;
