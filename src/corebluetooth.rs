pub mod platform;

mod delegates;
mod dispatch;
