pub(crate) mod ccsid;
pub(crate) mod codepoint;
pub(crate) mod dss;
pub(crate) mod frame_reader;
pub(crate) mod frame_writer;
pub(crate) mod parts;
pub(crate) mod replies;
pub(crate) mod requests;

pub(crate) use self::{
    ccsid::CcsidManager,
    frame_reader::{FrameReader, Peek},
    frame_writer::FrameWriter,
};
