pub mod normalizer;
pub mod validation;
