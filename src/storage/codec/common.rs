use crate::error::{QuillHashError, QuillHashResult};
use crate::storage::codec::DecodedData;

pub struct CommonCodec;

macro_rules! int_codec {
    ($encode:ident, $decode:ident, $ty:ty) => {
        pub fn $encode(data: $ty) -> Vec<u8> {
            data.to_be_bytes().to_vec()
        }

        pub fn $decode(bytes: &[u8]) -> QuillHashResult<DecodedData<$ty>> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            let raw = CommonCodec::take::<WIDTH>(bytes)?;
            Ok((<$ty>::from_be_bytes(raw), WIDTH))
        }
    };
}

impl CommonCodec {
    int_codec!(encode_u8, decode_u8, u8);
    int_codec!(encode_u32, decode_u32, u32);
    int_codec!(encode_u64, decode_u64, u64);
    int_codec!(encode_i32, decode_i32, i32);
    int_codec!(encode_i64, decode_i64, i64);

    pub fn encode_bool(data: bool) -> Vec<u8> {
        vec![data as u8]
    }

    pub fn decode_bool(bytes: &[u8]) -> QuillHashResult<DecodedData<bool>> {
        let (byte, offset) = Self::decode_u8(bytes)?;
        Ok((byte != 0, offset))
    }

    /// Reads exactly `len` raw bytes, no length prefix.
    pub fn decode_fixed_bytes(bytes: &[u8], len: usize) -> QuillHashResult<DecodedData<Vec<u8>>> {
        if bytes.len() < len {
            return Err(Self::short_input(bytes.len(), len));
        }
        Ok((bytes[..len].to_vec(), len))
    }

    fn take<const N: usize>(bytes: &[u8]) -> QuillHashResult<[u8; N]> {
        bytes
            .get(..N)
            .and_then(|head| head.try_into().ok())
            .ok_or_else(|| Self::short_input(bytes.len(), N))
    }

    fn short_input(actual: usize, expected: usize) -> QuillHashError {
        QuillHashError::Codec(format!(
            "bytes length {} is less than {}",
            actual, expected
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::CommonCodec;

    #[test]
    fn integers_are_big_endian() {
        assert_eq!(CommonCodec::encode_u32(0x0102_0304), vec![1, 2, 3, 4]);
        assert_eq!(
            CommonCodec::decode_i32(&[0xFF, 0xFF, 0xFF, 0xFE, 9]).unwrap(),
            (-2, 4)
        );
        assert_eq!(
            CommonCodec::decode_u64(&CommonCodec::encode_u64(u64::MAX - 1)).unwrap(),
            (u64::MAX - 1, 8)
        );
    }

    #[test]
    fn short_input_is_an_error() {
        assert!(CommonCodec::decode_u32(&[1, 2, 3]).is_err());
        assert!(CommonCodec::decode_i64(&[]).is_err());
        assert!(CommonCodec::decode_fixed_bytes(&[1, 2], 3).is_err());
        assert_eq!(
            CommonCodec::decode_fixed_bytes(&[1, 2, 3, 4], 3).unwrap(),
            (vec![1, 2, 3], 3)
        );
    }

    #[test]
    fn bool_round_trip_accepts_any_nonzero() {
        assert_eq!(CommonCodec::encode_bool(true), vec![1]);
        assert_eq!(CommonCodec::decode_bool(&[7]).unwrap(), (true, 1));
        assert_eq!(CommonCodec::decode_bool(&[0]).unwrap(), (false, 1));
    }
}
