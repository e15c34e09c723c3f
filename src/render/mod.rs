pub(crate) mod customize;
pub(crate) mod data;
pub(crate) mod effects;
pub(crate) mod gpu;
pub(crate) mod surface;
pub(crate) mod task;
