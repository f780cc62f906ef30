pub mod pinecone;

pub use pinecone::{PineconeConfig, PineconeIndex};
