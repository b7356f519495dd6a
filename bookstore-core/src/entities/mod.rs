pub mod author;
pub mod book;
pub mod order;

pub use author::Author;
pub use book::Book;
pub use order::{Order, OrderItem};

/// Status a fresh order carries until the payment provider reports
/// otherwise.
pub const INITIAL_ORDER_STATUS: &str = "created";
