pub(crate) mod image_cache;
