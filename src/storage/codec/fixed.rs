use crate::container::hash::GenericKey;
use crate::error::QuillHashResult;
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::storage::page::RecordId;

/// Fixed-width encoding used for keys and values stored in block pages.
///
/// `encode` must always produce exactly `ENCODED_SIZE` bytes so that slot
/// offsets inside a block can be computed without a length prefix.
pub trait FixedCodec: Sized + Clone + Send + Sync + 'static {
    const ENCODED_SIZE: usize;

    fn encode(&self) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> QuillHashResult<DecodedData<Self>>;
}

macro_rules! fixed_int {
    ($ty:ty, $encode:ident, $decode:ident) => {
        impl FixedCodec for $ty {
            const ENCODED_SIZE: usize = std::mem::size_of::<$ty>();

            fn encode(&self) -> Vec<u8> {
                CommonCodec::$encode(*self)
            }

            fn decode(bytes: &[u8]) -> QuillHashResult<DecodedData<Self>> {
                CommonCodec::$decode(bytes)
            }
        }
    };
}

fixed_int!(i32, encode_i32, decode_i32);
fixed_int!(i64, encode_i64, decode_i64);
fixed_int!(u32, encode_u32, decode_u32);
fixed_int!(u64, encode_u64, decode_u64);

impl FixedCodec for RecordId {
    const ENCODED_SIZE: usize = 8;

    fn encode(&self) -> Vec<u8> {
        let mut bytes = CommonCodec::encode_u32(self.page_id);
        bytes.extend(CommonCodec::encode_u32(self.slot_num));
        bytes
    }

    fn decode(bytes: &[u8]) -> QuillHashResult<DecodedData<Self>> {
        let (page_id, off1) = CommonCodec::decode_u32(bytes)?;
        let (slot_num, off2) = CommonCodec::decode_u32(&bytes[off1..])?;
        Ok((RecordId::new(page_id, slot_num), off1 + off2))
    }
}

impl<const N: usize> FixedCodec for GenericKey<N> {
    const ENCODED_SIZE: usize = N;

    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> QuillHashResult<DecodedData<Self>> {
        let (raw, offset) = CommonCodec::decode_fixed_bytes(bytes, N)?;
        Ok((GenericKey::from_bytes(&raw), offset))
    }
}
