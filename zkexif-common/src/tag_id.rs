//! 32-bit tag identifiers.
//!
//! FNV-1a over the UTF-8 bytes of the tag name. Distinct names can collide;
//! two colliding tags are indistinguishable to every commitment variant.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

pub fn tag_identifier(name: &str) -> u32 {
    name.as_bytes().iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ *byte as u32).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_offset_basis() {
        assert_eq!(tag_identifier(""), 0x811c_9dc5);
    }

    #[test]
    fn matches_reference_vectors() {
        assert_eq!(tag_identifier("a"), 0xe40c_292c);
        assert_eq!(tag_identifier("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn is_case_sensitive() {
        assert_ne!(tag_identifier("EXIF:Make"), tag_identifier("exif:make"));
    }
}
