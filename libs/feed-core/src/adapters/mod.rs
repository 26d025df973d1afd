// Declare modules within the adapters directory
pub mod in_memory_event_bus;
pub mod in_memory_repository;
pub mod postgres_repository;
pub mod rabbitmq_event_bus;
