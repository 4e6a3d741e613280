// Service Module - caller-owned units of work around the transition engine

pub mod store;
pub mod process_service;

pub use store::{InMemoryInstanceStore, TransactionalStore, UnitOfWork};
pub use process_service::ProcessService;
