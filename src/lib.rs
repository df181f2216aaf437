pub mod aws;
pub mod client;
pub mod config;
pub mod content;
pub mod dao;
pub mod entity;
pub mod model;
pub mod podcast;
pub mod rss;
pub mod storage;
pub mod util;

pub use config::Config;
pub use model::{Database, Record};
pub use util::{BoxError, BoxResult};
