//! Delivery side: chunking, retry policies and the adaptive delivery engine.

pub mod chunking;
pub mod engine;
pub mod retry;

pub use chunking::{split_in_two, UploadMethod};
pub use engine::DeliveryEngine;
pub use retry::{execute, BoundedRetry, ErrorFilter, PolicyWrap, RetryForever, RetryPolicy};
