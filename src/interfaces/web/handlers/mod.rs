pub mod health;
pub mod results;
