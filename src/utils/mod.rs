pub mod error;
pub mod extract;
pub mod nullable;
pub mod response;
