pub mod client;

pub use client::HttpClassifier;
