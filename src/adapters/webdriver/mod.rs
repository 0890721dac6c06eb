pub mod fantoccini_driver;
pub mod geckodriver;
