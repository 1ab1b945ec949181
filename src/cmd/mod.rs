pub mod ask;
pub mod extract;
