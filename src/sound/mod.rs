pub(crate) mod composition;
pub(crate) mod envelope;
pub(crate) mod handler;
pub(crate) mod merge;
pub(crate) mod reader;
pub(crate) mod samples;
pub(crate) mod source;
