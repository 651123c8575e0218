use crate::buffer::PAGE_SIZE;
use crate::error::{QuillHashError, QuillHashResult};
use crate::storage::codec::{CommonCodec, DecodedData, FixedCodec};
use crate::storage::page::{
    HashTableBlockPage, HashTableHeaderPage, SlotState, HEADER_MAX_BLOCK_IDS,
};

pub struct HashTableHeaderPageCodec;

impl HashTableHeaderPageCodec {
    pub fn encode(page: &HashTableHeaderPage) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PAGE_SIZE);
        bytes.extend(CommonCodec::encode_u32(page.page_id));
        bytes.extend(CommonCodec::encode_u64(page.capacity));
        bytes.extend(CommonCodec::encode_u32(page.block_capacity));
        bytes.extend(CommonCodec::encode_u32(page.block_page_ids.len() as u32));
        for page_id in page.block_page_ids.iter() {
            bytes.extend(CommonCodec::encode_u32(*page_id));
        }
        assert!(bytes.len() <= PAGE_SIZE);
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode(bytes: &[u8]) -> QuillHashResult<DecodedData<HashTableHeaderPage>> {
        let mut left = bytes;

        let (page_id, off) = CommonCodec::decode_u32(left)?;
        left = &left[off..];
        let (capacity, off) = CommonCodec::decode_u64(left)?;
        left = &left[off..];
        let (block_capacity, off) = CommonCodec::decode_u32(left)?;
        left = &left[off..];
        let (num_blocks, off) = CommonCodec::decode_u32(left)?;
        left = &left[off..];

        if num_blocks as usize > HEADER_MAX_BLOCK_IDS {
            return Err(QuillHashError::Codec(format!(
                "header page {} claims {} blocks, at most {} fit",
                page_id, num_blocks, HEADER_MAX_BLOCK_IDS
            )));
        }

        let mut block_page_ids = Vec::with_capacity(num_blocks as usize);
        for _ in 0..num_blocks {
            let (block_page_id, off) = CommonCodec::decode_u32(left)?;
            left = &left[off..];
            block_page_ids.push(block_page_id);
        }

        Ok((
            HashTableHeaderPage {
                page_id,
                capacity,
                block_capacity,
                block_page_ids,
            },
            PAGE_SIZE,
        ))
    }
}

pub struct HashTableBlockPageCodec;

impl HashTableBlockPageCodec {
    pub fn encode<K, V>(page: &HashTableBlockPage<K, V>) -> Vec<u8>
    where
        K: FixedCodec,
        V: FixedCodec + PartialEq,
    {
        let block_capacity = page.block_capacity();
        let bitmap_len = block_capacity.div_ceil(8);
        let mut occupied = vec![0u8; bitmap_len];
        let mut readable = vec![0u8; bitmap_len];
        let mut array = Vec::with_capacity(block_capacity * (K::ENCODED_SIZE + V::ENCODED_SIZE));

        for i in 0..block_capacity {
            let state = page.slot_state(i);
            if state.is_occupied() {
                occupied[i / 8] |= 1 << (i % 8);
            }
            if state.is_readable() {
                readable[i / 8] |= 1 << (i % 8);
            }
            match page.entry_at(i) {
                Some((key, value)) if state.is_occupied() => {
                    array.extend(key.encode());
                    array.extend(value.encode());
                }
                _ => array.resize(array.len() + K::ENCODED_SIZE + V::ENCODED_SIZE, 0),
            }
        }

        let mut bytes = Vec::with_capacity(PAGE_SIZE);
        bytes.extend(occupied);
        bytes.extend(readable);
        bytes.extend(array);
        assert!(bytes.len() <= PAGE_SIZE);
        bytes.resize(PAGE_SIZE, 0);
        bytes
    }

    pub fn decode<K, V>(
        bytes: &[u8],
        block_capacity: usize,
    ) -> QuillHashResult<DecodedData<HashTableBlockPage<K, V>>>
    where
        K: FixedCodec,
        V: FixedCodec + PartialEq,
    {
        let bitmap_len = block_capacity.div_ceil(8);
        let slot_size = K::ENCODED_SIZE + V::ENCODED_SIZE;
        let required = 2 * bitmap_len + block_capacity * slot_size;
        if bytes.len() < required {
            return Err(QuillHashError::Codec(format!(
                "block page needs {} bytes for {} slots, got {}",
                required,
                block_capacity,
                bytes.len()
            )));
        }

        let occupied = &bytes[..bitmap_len];
        let readable = &bytes[bitmap_len..2 * bitmap_len];
        let mut left = &bytes[2 * bitmap_len..];

        let mut slots = Vec::with_capacity(block_capacity);
        for i in 0..block_capacity {
            let mask = 1u8 << (i % 8);
            let is_occupied = occupied[i / 8] & mask != 0;
            let is_readable = readable[i / 8] & mask != 0;
            let state = match (is_occupied, is_readable) {
                (false, false) => SlotState::Empty,
                (true, false) => SlotState::Tombstone,
                (true, true) => SlotState::Live,
                (false, true) => {
                    return Err(QuillHashError::Codec(format!(
                        "slot {} is readable but not occupied",
                        i
                    )))
                }
            };

            if state == SlotState::Empty {
                left = &left[slot_size..];
                slots.push((state, None));
                continue;
            }
            let (key, off) = K::decode(left)?;
            left = &left[off..];
            let (value, off) = V::decode(left)?;
            left = &left[off..];
            slots.push((state, Some((key, value))));
        }

        Ok((HashTableBlockPage::from_slots(slots), PAGE_SIZE))
    }
}
