mod health;

pub use health::{health_check, index, stats};
