pub(crate) mod container;
pub(crate) mod handler;
pub(crate) mod manager;
pub(crate) mod storage;
