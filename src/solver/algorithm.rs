mod sipp;

pub(crate) use sipp::{sipp_search, SippResult};
