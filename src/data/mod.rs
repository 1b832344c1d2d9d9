pub mod audit;
pub mod enums;
pub mod error;
pub mod objects;
