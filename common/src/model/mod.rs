pub mod filter;
pub mod notification;
pub mod record;
pub mod responses;
