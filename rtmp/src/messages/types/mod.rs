pub mod amf0_command;
pub mod set_chunk_size;
