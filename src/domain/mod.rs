pub mod alert;
pub mod balance;
pub mod credentials;
pub mod notification;

// Re-export commonly used types
pub use alert::*;
pub use balance::*;
pub use credentials::*;
pub use notification::*;
