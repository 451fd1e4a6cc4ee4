pub mod automation;
pub mod health;
pub mod system;
