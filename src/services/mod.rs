pub mod checkpoint_service;
pub mod execution_client;
pub mod grading_service;
pub mod language;
pub mod proctoring;
pub mod question_cache;
pub mod quiz_service;
pub mod session;
pub mod session_service;
pub mod store_service;
