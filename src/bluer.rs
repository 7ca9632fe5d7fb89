pub mod platform;

mod error;
