pub mod access;
pub mod clinic;
pub mod staff;
