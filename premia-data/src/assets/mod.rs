pub mod level;
pub mod quote;
