pub mod config;
pub mod database;
pub mod job_queue;
pub mod kv_store;

pub use config::RedisConfig;
pub use database::Redis;
pub use job_queue::RedisJobQueue;
pub use kv_store::RedisStore;
