pub mod delivery_workers;
pub mod event_publisher;
pub mod execution_queue;
pub mod order_lifecycle;
pub mod push_registry;
pub mod resource_manager;
