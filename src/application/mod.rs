pub mod balance_extractor;
pub mod condition;
pub mod notifier;
pub mod number_parser;
pub mod polling_loop;
pub mod session;
