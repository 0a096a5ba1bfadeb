pub mod crag_reader;

pub use crag_reader::CragReader;
