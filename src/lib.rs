pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod media;
pub mod meta;
pub mod pool;
pub mod presenter;
pub mod scan;
pub mod search;
pub mod session;
pub mod source;
pub mod timer;
pub mod tasks {
    pub mod files;
    pub mod manager;
    pub mod remote;
}
