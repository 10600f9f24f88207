pub mod resources;
pub mod tasks;
