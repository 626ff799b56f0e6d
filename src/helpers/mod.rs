//! XML and ZIP plumbing shared by the source reader and the destination writer
pub(crate) mod xml;
pub(crate) mod zip;
