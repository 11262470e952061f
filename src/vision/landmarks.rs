//! Face landmark detection collaborator

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Face-mesh indices of the lip points we track, by name
pub const LIP_LANDMARKS: [(&str, usize); 5] = [
    ("cupids_bow", 0),
    ("upper_lip_inner", 13),
    ("lower_lip_inner", 14),
    ("mouth_left", 78),
    ("mouth_right", 308),
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// A normalized image coordinate in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Named lip landmarks for a single face
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FaceLandmarks {
    pub points: HashMap<String, Point>,
}

impl FaceLandmarks {
    /// Pick the tracked lip points out of a full face mesh
    ///
    /// Returns `None` if the mesh is too short to contain them.
    #[must_use]
    pub fn from_mesh(mesh: &[Point]) -> Option<Self> {
        let points = LIP_LANDMARKS
            .iter()
            .map(|&(name, index)| mesh.get(index).map(|p| (name.to_string(), *p)))
            .collect::<Option<HashMap<_, _>>>()?;
        Some(Self { points })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Point> {
        self.points.get(name).copied()
    }

    /// Vertical gap between the inner lips
    #[must_use]
    pub fn openness(&self) -> Option<f64> {
        let upper = self.get("upper_lip_inner")?;
        let lower = self.get("lower_lip_inner")?;
        Some((lower.y - upper.y).abs())
    }
}

/// Finds lip landmarks in an encoded image
#[async_trait]
pub trait LandmarkProvider: Send + Sync {
    /// Detect landmarks; any failure or missing face yields `None`
    async fn detect(&self, image: &[u8]) -> Option<FaceLandmarks>;
}

/// Provider used when no detector is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLandmarks;

#[async_trait]
impl LandmarkProvider for NoLandmarks {
    async fn detect(&self, _image: &[u8]) -> Option<FaceLandmarks> {
        None
    }
}

#[derive(Deserialize)]
struct MeshResponse {
    #[serde(default)]
    landmarks: Option<Vec<Point>>,
}

/// Face-mesh sidecar reached over HTTP
///
/// The sidecar receives the JPEG body and answers
/// `{"landmarks": [{"x": .., "y": ..}, ...]}` in face-mesh index order, or
/// `{"landmarks": null}` when no face is found.
pub struct HttpLandmarkProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpLandmarkProvider {
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(url: String) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(Error::Config("landmark detector URL is empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, url })
    }

    async fn request(&self, image: &[u8]) -> Result<Option<FaceLandmarks>> {
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "image/jpeg")
            .body(image.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Vision(format!("landmark detector returned {status}")));
        }

        let mesh: MeshResponse = response.json().await?;
        Ok(mesh.landmarks.as_deref().and_then(FaceLandmarks::from_mesh))
    }
}

#[async_trait]
impl LandmarkProvider for HttpLandmarkProvider {
    async fn detect(&self, image: &[u8]) -> Option<FaceLandmarks> {
        match self.request(image).await {
            Ok(landmarks) => landmarks,
            Err(e) => {
                tracing::warn!(error = %e, "landmark detection failed");
                None
            }
        }
    }
}

/// Strip an optional `data:` URL prefix from a base64 frame
#[must_use]
pub fn strip_data_url(frame: &str) -> &str {
    let frame = frame.trim();
    if frame.starts_with("data:") {
        frame.split_once(',').map_or("", |(_, data)| data)
    } else {
        frame
    }
}

/// Decode a base64 frame, accepting a `data:` URL
///
/// # Errors
///
/// Returns [`Error::Vision`] if the payload is not valid base64
pub fn decode_frame(frame: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(strip_data_url(frame))
        .map_err(|e| Error::Vision(format!("invalid frame encoding: {e}")))
}
