pub mod builder;
pub mod defaults;
pub mod driver;
pub mod reader;
pub mod session;
pub mod traits;
