//! Test Helper Utilities
//!
//! Fake models, a router wired to them, and multipart request building

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::{png_bytes, wav_bytes, AudioConfig};

use aigd_analyzer::dispatcher::Dispatcher;
use aigd_analyzer::error::{InferenceError, LoadError};
use aigd_analyzer::inference::{Classifier, FeatureTensor, InputShape, Label, RawPrediction};
use aigd_analyzer::registry::{ModelHandle, ModelLoader, ModelRegistry};
use aigd_analyzer::{build_router, AppState};
use aigd_common::Modality;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "aigd-test-boundary";

/// What a [`FakeClassifier`] does when asked for a prediction
#[derive(Debug, Clone)]
enum Behaviour {
    Answer(RawPrediction),
    Fail(String),
    Panic,
}

/// Classifier returning a fixed answer and recording what it was fed
pub struct FakeClassifier {
    shape: InputShape,
    behaviour: Behaviour,
    proba: Option<Vec<f32>>,
    inputs: Mutex<Vec<(&'static str, Vec<usize>)>>,
}

impl FakeClassifier {
    fn build(shape: &[i64], behaviour: Behaviour, proba: Option<Vec<f32>>) -> Arc<Self> {
        Arc::new(Self {
            shape: InputShape::from_signed(shape),
            behaviour,
            proba,
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn scores(shape: &[i64], scores: Vec<f32>) -> Arc<Self> {
        Self::build(shape, Behaviour::Answer(RawPrediction::Scores(scores)), None)
    }

    pub fn label(shape: &[i64], label: Label) -> Arc<Self> {
        Self::build(shape, Behaviour::Answer(RawPrediction::Label(label)), None)
    }

    /// Label classifier that also exposes class probabilities
    pub fn with_proba(shape: &[i64], label: Label, proba: Vec<f32>) -> Arc<Self> {
        Self::build(shape, Behaviour::Answer(RawPrediction::Label(label)), Some(proba))
    }

    /// Every prediction, probabilities included, is a backend error
    pub fn failing(shape: &[i64], message: &str) -> Arc<Self> {
        Self::build(shape, Behaviour::Fail(message.to_string()), Some(Vec::new()))
    }

    /// Every prediction panics after recording its input
    pub fn panicking(shape: &[i64]) -> Arc<Self> {
        Self::build(shape, Behaviour::Panic, None)
    }

    /// Kind and shape of every input received, in order
    pub fn inputs(&self) -> Vec<(&'static str, Vec<usize>)> {
        self.inputs.lock().unwrap().clone()
    }

    fn record(&self, input: &FeatureTensor) {
        self.inputs
            .lock()
            .unwrap()
            .push((input.kind_name(), input.shape()));
    }
}

impl Classifier for FakeClassifier {
    fn input_shape(&self) -> &InputShape {
        &self.shape
    }

    fn predict(&self, input: &FeatureTensor) -> Result<RawPrediction, InferenceError> {
        self.record(input);
        match &self.behaviour {
            Behaviour::Answer(prediction) => Ok(prediction.clone()),
            Behaviour::Fail(message) => Err(InferenceError::Backend(message.clone())),
            Behaviour::Panic => panic!("fake classifier panicked"),
        }
    }

    fn supports_proba(&self) -> bool {
        self.proba.is_some()
    }

    fn predict_proba(&self, input: &FeatureTensor) -> Result<Vec<f32>, InferenceError> {
        self.record(input);
        match &self.behaviour {
            Behaviour::Fail(message) => Err(InferenceError::Backend(message.clone())),
            Behaviour::Panic => panic!("fake classifier panicked"),
            Behaviour::Answer(_) => self
                .proba
                .clone()
                .ok_or_else(|| InferenceError::UnsupportedInput("no probabilities".to_string())),
        }
    }
}

/// Loader serving prepared handles; modalities without one are "missing"
#[derive(Default)]
pub struct FakeLoader {
    handles: HashMap<Modality, ModelHandle>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handle: ModelHandle) -> Self {
        self.handles.insert(handle.modality(), handle);
        self
    }

    pub fn with_classifier(self, modality: Modality, classifier: Arc<FakeClassifier>) -> Self {
        self.with(ModelHandle::new(modality, classifier))
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, modality: Modality) -> Result<ModelHandle, LoadError> {
        self.handles
            .get(&modality)
            .cloned()
            .ok_or_else(|| LoadError::Missing {
                path: PathBuf::from(format!("models/{}.onnx", modality)),
            })
    }
}

/// Router backed by a fake loader and a private upload directory
pub struct TestApp {
    pub router: Router,
    pub registry: Arc<ModelRegistry>,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn new(loader: FakeLoader) -> Self {
        let upload_dir = TempDir::new().unwrap();
        let registry = Arc::new(ModelRegistry::new(loader));
        let dispatcher = Dispatcher::new(registry.clone(), upload_dir.path());
        let router = build_router(AppState::new(dispatcher), 1024 * 1024);
        Self {
            router,
            registry,
            upload_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        TestResponse { status, bytes }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Files left behind in the upload directory
    pub fn leftover_uploads(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }
}

/// multipart/form-data body builder
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// POST /analyze with a file part and a type field
pub fn analyze_request(filename: &str, bytes: &[u8], modality: &str) -> Request<Body> {
    MultipartBody::new()
        .file("file", filename, bytes)
        .text("type", modality)
        .into_request("/analyze")
}
