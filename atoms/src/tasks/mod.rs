// Re-export model types and service functions
pub mod coerce;
pub mod error;
pub mod http;
pub mod memory;
pub mod model;
pub mod repository;
pub mod service;
pub mod sqlite;

pub use error::{StoreError, TaskError};
pub use memory::InMemoryRepository;
pub use model::{CreateTaskPayload, Task, TaskQuery, UpdateTaskPayload};
pub use repository::{Backend, TaskRepository};
pub use service::TaskService;
pub use sqlite::{ConnectionConfig, RelationalRepository};
