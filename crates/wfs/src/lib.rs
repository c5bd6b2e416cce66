#![forbid(unsafe_code)]
//! Public API for reading WFS disk images.
//!
//! Re-exports `wfs-core`. Downstream consumers depend on this crate rather
//! than on the individual layers.

pub use wfs_core::*;

#[cfg(test)]
mod tests {
    use super::*;
    use wfs_harness::fixtures;

    #[test]
    fn facade_reexports_open_and_read() {
        let dev = fixtures::two_block_chain().build();
        let image = WfsImage::from_device(Box::new(dev), &OpenOptions::default()).unwrap();
        let entry = image.resolve("/chain.bin").unwrap();
        assert_eq!(image.get_attributes(&entry).size, 900);
        assert_eq!(image.read(&entry, 0, 4096).unwrap().len(), 900);
    }
}
