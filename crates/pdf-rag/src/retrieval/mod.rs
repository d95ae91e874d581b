//! Retrieval: query embedding and ranked passage search

mod retriever;

pub use retriever::Retriever;
