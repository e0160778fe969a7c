//! In-memory task persistence.

mod repository;

pub use repository::InMemoryTaskRepository;
