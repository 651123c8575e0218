pub mod codec;
pub mod disk_manager;
pub mod page;
