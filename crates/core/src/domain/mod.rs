pub mod incident;
pub mod intent;
pub mod message;
pub mod ticket;
