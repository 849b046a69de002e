pub mod ask;
pub mod eval;
pub mod index;
pub mod status;
