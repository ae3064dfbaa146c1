pub mod data_info;
pub mod process;
