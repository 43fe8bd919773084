pub mod execution_dto;
pub mod session_dto;
