pub mod domain;
pub mod youtube;
