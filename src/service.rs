pub(crate) mod async_compositor;
