use base64::{engine::general_purpose::STANDARD, Engine};
use md5::{Digest, Md5};

/// Base64 of the MD5 digest, the form storage services verify uploads with.
pub fn content_checksum(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}
