pub mod temp_storage;
