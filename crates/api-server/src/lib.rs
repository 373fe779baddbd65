#![warn(clippy::unwrap_used)]

pub mod admin;
pub mod rest;
pub mod server;
pub mod swagger;

pub use server::ApiServer;
pub use swagger::ApiDoc;
