use core::fmt::Write;

use crate::error::OtaError;

pub const REQUEST_CAPACITY: usize = 512;

pub type RequestBuffer = heapless::String<REQUEST_CAPACITY>;

/// Builds the `GET` request for `image` on `host`.
pub fn build_request(host: &str, image: &str, user_agent: &str) -> Result<RequestBuffer, OtaError> {
    let mut request = RequestBuffer::new();
    write!(
        request,
        "GET /{image} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Connection: keep-alive\r\n\
         Cache-Control: no-cache\r\n\
         User-Agent: {user_agent}\r\n\
         Accept: */*\r\n\r\n"
    )
    .map_err(|_| OtaError::AllocationFailure)?;
    Ok(request)
}
