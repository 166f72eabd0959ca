//! Type adapter for storing URIs in the tries

use std::cmp::Ordering;
use std::ptr::NonNull;

use crate::adapter::TypeAdapter;
use crate::error::Result;
use crate::memory;

use super::EncodedUri;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> usize {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as usize
}

/// Full-surface [`TypeAdapter`] for [`EncodedUri`]: deep copy through
/// the allocator, destroy, byte-order comparison, FNV-1a hashing, and
/// the encoded bytes as the binary key.
#[derive(Debug, Default, Clone, Copy)]
pub struct UriAdapter;

impl TypeAdapter<EncodedUri> for UriAdapter {
    fn new_copy(&self, src: &EncodedUri) -> Result<Option<NonNull<EncodedUri>>> {
        let copy = src.try_clone()?;
        Ok(Some(memory::alloc_raw(copy)?))
    }

    fn delete(&self, obj: NonNull<EncodedUri>) -> Result<()> {
        // Safety: per the trait contract obj came from new_copy above
        unsafe {
            std::ptr::drop_in_place(obj.as_ptr());
            memory::free_raw(obj);
        }
        Ok(())
    }

    fn cmp_obj_obj(&self, a: &EncodedUri, b: &EncodedUri) -> Option<Ordering> {
        Some(a.bytes().cmp(b.bytes()))
    }

    fn hash_obj(&self, obj: &EncodedUri) -> Option<usize> {
        Some(fnv1a(obj.bytes()))
    }

    fn hash_key(&self, key: usize) -> Option<usize> {
        Some(fnv1a(&key.to_ne_bytes()))
    }

    fn binary_key<'a>(&self, obj: &'a EncodedUri) -> Option<&'a [u8]> {
        Some(obj.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_adapter_copy_is_deep() {
        let adapter = UriAdapter;
        let uri = EncodedUri::parse(b"http://h/a?k=v").unwrap();

        let copy = adapter.new_copy(&uri).unwrap().expect("copies");
        let copied = unsafe { copy.as_ref() };
        assert_eq!(copied.bytes(), uri.bytes());
        assert_ne!(copied.bytes().as_ptr(), uri.bytes().as_ptr());

        adapter.delete(copy).unwrap();
    }

    #[test]
    fn test_uri_adapter_compare_and_hash() {
        let adapter = UriAdapter;
        let a = EncodedUri::parse(b"http://h/a").unwrap();
        let b = EncodedUri::parse(b"http://h/b").unwrap();

        assert_eq!(adapter.cmp_obj_obj(&a, &a), Some(Ordering::Equal));
        assert_eq!(adapter.cmp_obj_obj(&a, &b), Some(Ordering::Less));
        assert_eq!(adapter.hash_obj(&a), adapter.hash_obj(&a));
        assert_ne!(adapter.hash_obj(&a), adapter.hash_obj(&b));
        assert_eq!(adapter.binary_key(&a), Some(a.bytes()));
    }

    #[test]
    fn test_fnv1a_known_values() {
        // Standard FNV-1a 64-bit vectors, truncated to usize
        assert_eq!(fnv1a(b""), FNV_OFFSET as usize);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c_u64 as usize);
    }
}
