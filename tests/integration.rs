use recipe_imager::{
    ai::{
        ImageGenerator, MockImageGenerationClient, MockPromptDeriver, OpenRouterPromptDeriver,
        StabilityImageClient,
    },
    html,
    image::{
        build_converter, BestEffortConverter, ConverterStrategy, MockConversionStrategy,
    },
    models::{GeneratedImageMap, ImageProvider, ImageReference},
    server, AcquirerServices, AcquisitionHooks, AcquisitionOutcome, AcquisitionRegistry,
    AcquisitionRequest, ImageAcquirer, NoopHooks,
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STABILITY_PATH: &str = "/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";

fn create_test_png() -> Vec<u8> {
    let img = ::image::RgbaImage::from_pixel(12, 12, ::image::Rgba([200, 120, 40, 255]));
    let mut bytes = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut bytes),
        ::image::ImageFormat::Png,
    )
    .unwrap();
    bytes
}

#[derive(Default)]
struct CollectingHooks {
    ready: Mutex<Vec<GeneratedImageMap>>,
    errors: Mutex<Vec<String>>,
}

impl AcquisitionHooks for CollectingHooks {
    fn on_images_ready(&self, images: &GeneratedImageMap) {
        self.ready.lock().unwrap().push(images.clone());
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

async fn mount_openrouter(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .and(header("authorization", "Bearer or-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_stability(server: &MockServer) {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::STANDARD.encode(create_test_png());

    Mock::given(method("POST"))
        .and(path(STABILITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "artifacts": [{ "base64": b64, "finishReason": "SUCCESS" }]
        })))
        .mount(server)
        .await;
}

fn real_acquirer(
    server: &MockServer,
    strategy: ConverterStrategy,
    hooks: Arc<dyn AcquisitionHooks>,
) -> ImageAcquirer {
    let http_client = reqwest::Client::new();
    let deriver = OpenRouterPromptDeriver::new_with_client(
        Some("or-key".to_string()),
        "openrouter/auto".to_string(),
        http_client.clone(),
    )
    .with_base_url(server.uri());
    let stability = StabilityImageClient::new_with_client(
        "st-key".to_string(),
        "stable-diffusion-xl-1024-v1-0".to_string(),
        http_client.clone(),
    )
    .with_base_url(server.uri());

    ImageAcquirer::with_services(
        AcquirerServices {
            deriver: Box::new(deriver),
            generator: ImageGenerator::new()
                .with_provider(ImageProvider::Stability, Box::new(stability)),
            converter: build_converter(&strategy, http_client),
        },
        hooks,
    )
}

#[tokio::test]
async fn test_full_pipeline_with_local_conversion() {
    let server = MockServer::start().await;
    mount_openrouter(
        &server,
        "Here you go:\n{\"hero_image\": \"golden toast on a plate\", \"step1_image\": \"bread in a toaster\"}",
    )
    .await;
    mount_stability(&server).await;

    let hooks = Arc::new(CollectingHooks::default());
    let acquirer = real_acquirer(&server, ConverterStrategy::default(), hooks.clone());

    let outcome = acquirer
        .acquire(AcquisitionRequest::new(
            "How to make toast",
            ImageProvider::Stability,
        ))
        .await;

    let images = outcome.into_images().unwrap();
    let slots: Vec<&str> = images.keys().map(String::as_str).collect();
    assert_eq!(slots, vec!["hero_image", "step1_image"]);

    for reference in images.values() {
        let (mime, bytes) = reference.decode_data_uri().unwrap();
        assert_eq!(mime, "image/webp");
        let decoded = ::image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 12));
    }

    assert_eq!(hooks.ready.lock().unwrap().len(), 1);
    assert!(hooks.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_full_pipeline_with_remote_conversion_service() {
    let providers = MockServer::start().await;
    mount_openrouter(&providers, r#"{"hero_image": "golden toast on a plate"}"#).await;
    mount_stability(&providers).await;

    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let converter_base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(server::serve(listener, dir.path().join("converted-images")));

    let acquirer = real_acquirer(
        &providers,
        ConverterStrategy::Remote {
            endpoint: format!("{}/convert-file", converter_base),
        },
        Arc::new(NoopHooks),
    );

    let images = acquirer
        .acquire(AcquisitionRequest::new("Toast", ImageProvider::Stability))
        .await
        .into_images()
        .unwrap();

    let hero = images["hero_image"].as_str().to_string();
    assert!(hero.starts_with(&format!("{}/converted-images/", converter_base)));
    assert!(hero.ends_with(".webp"));

    let served = reqwest::get(&hero).await.unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.headers()["content-type"], "image/webp");
}

#[tokio::test]
async fn test_remote_conversion_outage_keeps_generated_images() {
    let providers = MockServer::start().await;
    mount_openrouter(&providers, r#"{"hero_image": "golden toast on a plate"}"#).await;
    mount_stability(&providers).await;

    let acquirer = real_acquirer(
        &providers,
        ConverterStrategy::Remote {
            endpoint: "http://127.0.0.1:9/convert-file".to_string(),
        },
        Arc::new(NoopHooks),
    );

    let images = acquirer
        .acquire(AcquisitionRequest::new("Toast", ImageProvider::Stability))
        .await
        .into_images()
        .unwrap();

    // Fallback keeps the provider's original PNG data URI.
    let (mime, _) = images["hero_image"].decode_data_uri().unwrap();
    assert_eq!(mime, "image/png");
}

#[tokio::test]
async fn test_prompt_service_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let hooks = Arc::new(CollectingHooks::default());
    let acquirer = real_acquirer(&server, ConverterStrategy::default(), hooks.clone());

    let outcome = acquirer
        .acquire(AcquisitionRequest::new("Toast", ImageProvider::Stability))
        .await;

    assert!(matches!(outcome, AcquisitionOutcome::Failed(_)));
    assert_eq!(hooks.errors.lock().unwrap().len(), 1);
    assert!(hooks.ready.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_registry_trigger_renders_html() {
    let acquirer = Arc::new(ImageAcquirer::with_services(
        AcquirerServices {
            deriver: Box::new(
                MockPromptDeriver::new()
                    .with_prompt("hero_image", "golden toast")
                    .with_prompt("final_dish_image", "toast with jam"),
            ),
            generator: ImageGenerator::new().with_provider(
                ImageProvider::Leonardo,
                Box::new(
                    MockImageGenerationClient::new()
                        .with_image_response(ImageReference::new("https://img.test/a.png")),
                ),
            ),
            converter: Box::new(BestEffortConverter::new(MockConversionStrategy::new())),
        },
        Arc::new(NoopHooks),
    ));

    let registry = AcquisitionRegistry::new();
    let _registration = registry.register("integration_images", acquirer);

    let outcome = registry
        .trigger(
            "integration_images",
            AcquisitionRequest::new("Toast", ImageProvider::Leonardo),
        )
        .await
        .unwrap();
    let images = outcome.into_images().unwrap();

    let rendered = html::image_blocks(&images, "toast");
    assert_eq!(rendered.matches("<p><img ").count(), 2);
    assert!(rendered.contains("src=\"https://img.test/a.png.webp\""));
    assert!(rendered.contains("alt=\"final dish_image for toast\""));
}
