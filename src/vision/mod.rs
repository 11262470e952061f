//! Video-side collaborators: landmark detection and lip reading

mod landmarks;
mod lip_reading;

pub use landmarks::{
    FaceLandmarks, HttpLandmarkProvider, LIP_LANDMARKS, LandmarkProvider,
    NoLandmarks, Point, decode_frame, strip_data_url,
};
pub use lip_reading::{
    GeminiLipReader, HISTORY_CAPACITY, LipAnalyzer, LipHistory, LipReadingConfig,
    LipReadingResult, LipReadingSession, parse_reply,
};
