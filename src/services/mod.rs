pub mod audio;
pub mod db;
pub mod embedding;
pub mod llm;
pub mod memory;
pub mod phone;
pub mod transcript;
