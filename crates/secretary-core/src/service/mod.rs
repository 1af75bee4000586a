#[cfg(feature = "http-api")]
pub mod http;

#[cfg(feature = "http-api")]
pub mod pages;
