pub mod browser;
pub mod mailer;

pub use browser::*;
pub use mailer::*;
