//! Minimal HTTP/1.1 client side: the image request and response header
//! parsing. Chunked transfer encoding is not supported.

mod request;
mod response;

pub use request::{REQUEST_CAPACITY, RequestBuffer, build_request};
pub use response::{HEADER_CAPACITY, HeaderAccumulator, HeaderProgress, find_content_length, parse_header};
