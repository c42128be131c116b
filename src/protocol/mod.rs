pub mod messages;

pub use messages::{
    AudioData, Business, Common, FrameMessage, FrameStatus, RecognitionResult, ResponseData,
    ResponseMessage, Word, WordGroup,
};
