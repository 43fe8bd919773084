pub mod attempt;
pub mod execution;
pub mod question;
pub mod quiz;
pub mod result;
