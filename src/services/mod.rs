pub mod cache;
pub mod crypto;
pub mod http;
pub mod keys;
pub mod m3u_parser;
pub mod metrics;
pub mod providers;
pub mod redis;
pub mod warmup;
