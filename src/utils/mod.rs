pub mod checksum;
pub mod csrf;
pub mod file_picker;
pub mod file_size;
pub mod header_parser;
