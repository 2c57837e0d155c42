pub mod media_stream;
