pub mod agent;
pub mod cart;
pub mod intent;
pub mod message;
pub mod task;
