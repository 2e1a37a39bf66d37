pub(crate) mod compositor;
pub(crate) mod draw;
pub(crate) mod job;
pub(crate) mod parts;
