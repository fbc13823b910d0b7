mod common;
mod job_queue_tests;
mod link_store_tests;
