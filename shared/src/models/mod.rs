//! Domain models for the Stock Ledger platform

mod activity;
mod additional_stock;
mod lender;
mod movement;
mod product;
mod report;
mod returns;
mod sale;
mod user;

pub use activity::*;
pub use additional_stock::*;
pub use lender::*;
pub use movement::*;
pub use product::*;
pub use report::*;
pub use returns::*;
pub use sale::*;
pub use user::*;
