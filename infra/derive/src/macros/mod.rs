pub mod bindings;
pub mod error;
