pub mod dto;
pub mod todo;
