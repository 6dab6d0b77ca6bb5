//! Container headers and trailers around a raw deflate payload.
//!
//! The framer never looks at the decoded content: its checksum state always
//! comes from the caller, because for the innermost layer that content only
//! exists as a plan.

use crate::checksum::ChecksumState;
use crate::codec::Codec;
use crate::config::HeaderConfig;
use crate::plan::ContentPlan;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_CM_DEFLATE: u8 = 8;
const GZIP_FLAG_FNAME: u8 = 0x08;
/// CM = 8 (deflate), CINFO = 7 (32 KiB window).
const ZLIB_CMF: u8 = 0x78;

pub fn header_bytes(codec: Codec, header: &HeaderConfig) -> Vec<u8> {
    match codec {
        Codec::Gzip => {
            let mut out = Vec::with_capacity(10);
            out.extend_from_slice(&GZIP_MAGIC);
            out.push(GZIP_CM_DEFLATE);
            out.push(if header.file_name.is_some() { GZIP_FLAG_FNAME } else { 0 });
            out.extend_from_slice(&header.mtime.to_le_bytes());
            out.push(header.xfl);
            out.push(header.os);
            if let Some(name) = &header.file_name {
                out.extend_from_slice(name.as_bytes());
                out.push(0);
            }
            out
        }
        Codec::Deflate => {
            let mut flg = (header.zlib_level & 0b11) << 6;
            let check = (u16::from(ZLIB_CMF) * 256 + u16::from(flg)) % 31;
            if check != 0 {
                flg += (31 - check) as u8;
            }
            vec![ZLIB_CMF, flg]
        }
        Codec::DeflateRaw => Vec::new(),
    }
}

pub fn trailer_bytes(codec: Codec, decoded: &ChecksumState) -> Vec<u8> {
    match codec {
        Codec::Gzip => {
            let mut out = Vec::with_capacity(8);
            out.extend_from_slice(&decoded.crc32().to_le_bytes());
            out.extend_from_slice(&decoded.len_mod_2_32().to_le_bytes());
            out
        }
        Codec::Deflate => decoded.adler32().to_be_bytes().to_vec(),
        Codec::DeflateRaw => Vec::new(),
    }
}

/// Wrap `payload` in `codec`'s container. `decoded` describes the content
/// the payload inflates to.
pub fn frame(
    codec: Codec,
    payload: ContentPlan,
    decoded: &ChecksumState,
    header: &HeaderConfig,
) -> ContentPlan {
    let mut out = ContentPlan::from_bytes(header_bytes(codec, header));
    out.append(payload);
    out.push_literal(&trailer_bytes(codec, decoded));
    out
}
