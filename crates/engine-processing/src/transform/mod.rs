pub mod checks;
pub mod split;
pub mod validation;
