use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage, Rgba};
use jewel_composer_core::error::{AppError, Result};
use jewel_composer_core::model::ResponsePart;
use jewel_composer_core::prompt::{DESCRIBE_PROMPT, FALLBACK_PLACEMENT};
use jewel_composer_core::{
    CompositeRequest, Compositor, EncodedImage, GenerativeModel, ImageProcessor, PipelineEvent,
    RelativePosition, Stage,
};
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::mpsc::channel;

const SCENE_COLOR: Rgba<u8> = Rgba([30, 60, 160, 255]);
const DESCRIPTION: &str = "The jewelry location is on the wrist, just above the watch strap.";

enum Describe {
    Answer(String),
    Fail,
}

enum Compose {
    /// Answer with the clean scene it was sent, like a model that changed nothing.
    EchoScene,
    /// Answer with a solid square of the given side.
    Square(u32),
    Parts(Vec<ResponsePart>),
    Fail,
}

#[derive(Default)]
struct Calls {
    describe_images: Vec<EncodedImage>,
    describe_prompts: Vec<String>,
    compose_images: Vec<Vec<EncodedImage>>,
    compose_prompts: Vec<String>,
}

struct FakeModel {
    describe: Describe,
    compose: Compose,
    calls: Mutex<Calls>,
}

impl FakeModel {
    fn new(describe: Describe, compose: Compose) -> Self {
        Self {
            describe,
            compose,
            calls: Mutex::new(Calls::default()),
        }
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    async fn describe(&self, image: &EncodedImage, prompt: &str) -> Result<String> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.describe_images.push(image.clone());
            calls.describe_prompts.push(prompt.to_string());
        }
        match &self.describe {
            Describe::Answer(text) => Ok(text.clone()),
            Describe::Fail => Err(AppError::gemini("describe quota exhausted")),
        }
    }

    async fn compose(&self, images: &[EncodedImage], prompt: &str) -> Result<Vec<ResponsePart>> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.compose_images.push(images.to_vec());
            calls.compose_prompts.push(prompt.to_string());
        }
        match &self.compose {
            Compose::EchoScene => Ok(vec![
                ResponsePart::Text("Here is the composite.".to_string()),
                ResponsePart::InlineImage {
                    mime_type: images[1].mime_type.clone(),
                    data: images[1].to_base64(),
                },
            ]),
            Compose::Square(side) => {
                let square = RgbImage::from_pixel(*side, *side, Rgb([200, 180, 20]));
                let encoded = ImageProcessor::encode_jpeg(&square)?;
                Ok(vec![ResponsePart::InlineImage {
                    mime_type: encoded.mime_type.clone(),
                    data: encoded.to_base64(),
                }])
            }
            Compose::Parts(parts) => Ok(parts.clone()),
            Compose::Fail => Err(AppError::gemini("503 Service Unavailable")),
        }
    }
}

fn png_bytes(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, color);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

fn decode_url(url: &str) -> RgbImage {
    let encoded = EncodedImage::from_data_url(url).unwrap();
    ImageProcessor::decode(&encoded.bytes).unwrap().to_rgb8()
}

fn is_marker_red(pixel: &Rgb<u8>) -> bool {
    let [r, g, b] = pixel.0;
    r > 200 && g < 80 && b < 80
}

fn inputs() -> (Vec<u8>, Vec<u8>) {
    (
        png_bytes(800, 600, Rgba([220, 200, 120, 255])),
        png_bytes(1200, 800, SCENE_COLOR),
    )
}

#[tokio::test]
async fn end_to_end_composite() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::EchoScene));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER)
        .with_labels("bangle.png", "arm.png")
        .with_scale(1.0);

    let result = compositor.generate_composite(&request).await.unwrap();

    // The image model saw product, clean scene and marked scene, all 1024 squares.
    let calls = compositor.model().calls.lock().unwrap();
    assert_eq!(calls.compose_images.len(), 1);
    let sent = &calls.compose_images[0];
    assert_eq!(sent.len(), 3);
    for image in sent {
        let decoded = ImageProcessor::decode(&image.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 1024));
    }
    let clean = ImageProcessor::decode(&sent[1].bytes).unwrap().to_rgb8();
    assert!(!is_marker_red(clean.get_pixel(512, 512)), "clean scene must stay unmarked");

    // The describe call saw the marked scene with the fixed instruction.
    assert_eq!(calls.describe_images.len(), 1);
    assert_eq!(calls.describe_images[0], sent[2]);
    assert_eq!(calls.describe_prompts[0], DESCRIBE_PROMPT);
    assert_eq!(result.debug_image_url, sent[2].to_data_url());

    // Content is vertically centered, so a 50/50 placement sits at the canvas
    // center; the padding band above the content stays gray.
    let debug = decode_url(&result.debug_image_url);
    assert_eq!(debug.dimensions(), (1024, 1024));
    assert!(is_marker_red(debug.get_pixel(512, 512)));
    let [r, g, b] = debug.get_pixel(512, 80).0;
    assert!(r.abs_diff(128) < 8 && g.abs_diff(128) < 8 && b.abs_diff(128) < 8);

    let final_image = decode_url(&result.final_image_url);
    let aspect = final_image.width() as f64 / final_image.height() as f64;
    assert!((aspect - 1.5).abs() / 1.5 < 0.005, "final aspect {}", aspect);
    assert_eq!(final_image.dimensions(), (1024, 683));

    assert!(result.final_prompt.contains("100%"));
    assert!(result.final_prompt.contains(DESCRIPTION));
    assert!(result.final_prompt.contains("Local light near placement is"));
    assert_eq!(calls.compose_prompts[0], result.final_prompt);
}

#[tokio::test]
async fn off_center_marker_follows_the_content_offset() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::EchoScene));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::new(25.0, 75.0));

    let result = compositor.generate_composite(&request).await.unwrap();
    let debug = decode_url(&result.debug_image_url);

    // y = 170.67 offset + 75% of the 682.67 content height.
    assert!(is_marker_red(debug.get_pixel(256, 683)));
    // Where the marker would be without the letterbox offset.
    assert!(!is_marker_red(debug.get_pixel(256, 768)));
}

#[tokio::test]
async fn describe_failure_falls_back() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Fail, Compose::EchoScene));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::new(40.0, 60.0));

    let result = compositor.generate_composite(&request).await.unwrap();
    assert!(result.final_prompt.contains(&format!("\"{}\"", FALLBACK_PLACEMENT)));
    assert!(!result.final_prompt.contains("describe quota exhausted"));
}

#[tokio::test]
async fn blank_description_falls_back() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer("  \n ".to_string()), Compose::EchoScene));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER);

    let result = compositor.generate_composite(&request).await.unwrap();
    assert!(result.final_prompt.contains(FALLBACK_PLACEMENT));
}

#[tokio::test]
async fn scale_factor_reaches_the_prompt() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::EchoScene));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER).with_scale(1.5);

    let result = compositor.generate_composite(&request).await.unwrap();
    assert!(result.final_prompt.contains("approximately 150% of that realistic size"));
}

#[tokio::test]
async fn text_only_response_is_no_image() {
    let (product, scene) = inputs();
    let reply = Compose::Parts(vec![ResponsePart::Text("I cannot do that.".to_string())]);
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), reply));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER);

    let err = compositor.generate_composite(&request).await.unwrap_err();
    assert!(matches!(err, AppError::NoImageReturned));
    assert!(err.to_string().contains("did not return an image"));
}

#[tokio::test]
async fn compose_failure_is_fatal_and_not_retried() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::Fail));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER);
    let (tx, rx) = channel();

    let err = compositor
        .generate_composite_with_events(&request, Some(&tx))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::GeminiApi(ref msg) if msg.contains("503")));
    assert_eq!(compositor.model().calls.lock().unwrap().compose_images.len(), 1);

    // The debug image was published before the remote calls.
    let events: Vec<PipelineEvent> = rx.try_iter().collect();
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::DebugImage(url) if url.starts_with("data:image/jpeg;base64,"))));
    assert!(!events.contains(&PipelineEvent::Stage(Stage::Restoring)));
}

#[tokio::test]
async fn undecodable_scene_fails_before_any_remote_call() {
    let (product, _) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::EchoScene));
    let request = CompositeRequest::new(&product, b"not an image at all", RelativePosition::CENTER);

    let err = compositor.generate_composite(&request).await.unwrap_err();
    assert!(matches!(err, AppError::Decode(_)));
    let calls = compositor.model().calls.lock().unwrap();
    assert!(calls.describe_images.is_empty());
    assert!(calls.compose_images.is_empty());
}

#[tokio::test]
async fn invalid_placement_is_rejected() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::EchoScene));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::new(50.0, 120.0));

    let err = compositor.generate_composite(&request).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn stages_are_reported_in_order() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::EchoScene));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER);
    let (tx, rx) = channel();

    compositor
        .generate_composite_with_events(&request, Some(&tx))
        .await
        .unwrap();

    let stages: Vec<Stage> = rx
        .try_iter()
        .filter_map(|event| match event {
            PipelineEvent::Stage(stage) => Some(stage),
            PipelineEvent::DebugImage(_) => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            Stage::MeasuringScene,
            Stage::Normalizing,
            Stage::Marking,
            Stage::AnalyzingLight,
            Stage::DescribingPlacement,
            Stage::BuildingPrompt,
            Stage::Generating,
            Stage::Restoring,
        ]
    );
}

#[tokio::test]
async fn off_size_model_output_is_rescaled_before_cropping() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::Square(512)));
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER);

    let result = compositor.generate_composite(&request).await.unwrap();
    assert_eq!(decode_url(&result.final_image_url).dimensions(), (1024, 683));
}

#[tokio::test]
async fn custom_target_dimension_is_honoured() {
    let (product, scene) = inputs();
    let compositor = Compositor::new(FakeModel::new(Describe::Answer(DESCRIPTION.to_string()), Compose::EchoScene))
        .with_target_dimension(512);
    let request = CompositeRequest::new(&product, &scene, RelativePosition::CENTER);

    let result = compositor.generate_composite(&request).await.unwrap();
    assert_eq!(decode_url(&result.debug_image_url).dimensions(), (512, 512));
    // 512 / 1.5 = 341.33
    assert_eq!(decode_url(&result.final_image_url).dimensions(), (512, 341));
}
