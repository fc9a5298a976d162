//! End-to-end behavior of the finishing pipeline against a stand-in gateway

mod common;

use common::{encode, gradient, png_bytes, HalfGateway};
use image::ImageFormat;
use nobg::{
    encoder::decode, finish_from_reader, BackgroundColor, BatchInput, ErrorCategory, FinishingPipeline, MemorySink,
    NoBgError, PipelineConfig, ProcessingStage,
};
use std::io::{Cursor, Read};
use tempfile::TempDir;

#[tokio::test]
async fn failing_item_does_not_stop_the_batch() {
    let mut gateway = HalfGateway::failing_on(&[1]);
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
    let inputs = vec![
        BatchInput::from_bytes("first.png", png_bytes(6, 4)),
        BatchInput::from_bytes("second.png", png_bytes(6, 4)),
        BatchInput::from_bytes("third.png", png_bytes(6, 4)),
    ];
    let mut sink = MemorySink::new();

    let outcome = pipeline.run(&inputs, &mut sink).await.unwrap();

    assert_eq!(outcome.report.succeeded, 2);
    assert_eq!(outcome.report.failed, 1);
    assert_eq!(outcome.report.failures[0].index, 1);
    assert_eq!(outcome.report.failures[0].name, "second.png");
    assert_eq!(outcome.report.failures[0].stage, ProcessingStage::Segmentation);

    let names: Vec<&str> = sink.items().iter().map(|item| item.name()).collect();
    assert_eq!(names, vec!["first_noBg.png", "third_noBg.png"]);
    drop(pipeline);
    assert_eq!(gateway.calls, 3);
}

#[tokio::test]
async fn transparent_output_keeps_source_pixels_exactly() {
    let source = gradient(8, 3);
    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();

    let item = pipeline
        .finish_one(BatchInput::from_bytes("grad.png", encode(&source, ImageFormat::Png)))
        .await
        .unwrap();
    let output = decode(item.bytes()).unwrap().to_rgba8();

    assert_eq!(output.dimensions(), (8, 3));
    for (x, y, pixel) in output.enumerate_pixels() {
        let expected_alpha = if x < 4 { 0 } else { 255 };
        assert_eq!(pixel[3], expected_alpha, "alpha at ({x}, {y})");
        assert_eq!(&pixel.0[..3], &source.get_pixel(x, y).0[..], "rgb at ({x}, {y})");
    }
}

#[tokio::test]
async fn background_color_flattens_to_opaque_rgb() {
    let source = gradient(4, 2);
    let config = PipelineConfig::builder()
        .background(Some(BackgroundColor::white()))
        .build()
        .unwrap();
    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, config).unwrap();

    let item = pipeline
        .finish_one(BatchInput::from_bytes("grad.bmp", encode(&source, ImageFormat::Bmp)))
        .await
        .unwrap();
    assert_eq!(item.name(), "grad_noBg.png");

    let output = decode(item.bytes()).unwrap();
    assert!(!output.color().has_alpha());
    let output = output.to_rgb8();
    assert_eq!(output.get_pixel(0, 0).0, [255, 255, 255]);
    assert_eq!(output.get_pixel(3, 1), source.get_pixel(3, 1));
}

#[tokio::test]
async fn archive_holds_every_success_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let on_disk = temp_dir.path().join("disk.jpg");
    std::fs::write(&on_disk, encode(&gradient(5, 5), ImageFormat::Jpeg)).unwrap();

    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
    let inputs = vec![
        BatchInput::from_bytes("b.png", png_bytes(3, 3)),
        BatchInput::from_path(&on_disk),
    ];
    let mut sink = MemorySink::new();
    let outcome = pipeline.run(&inputs, &mut sink).await.unwrap();

    let bytes = outcome.archive().unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);

    for (index, item) in sink.items().iter().enumerate() {
        let mut entry = archive.by_index(index).unwrap();
        assert_eq!(entry.name(), item.name());
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, item.bytes());
    }
}

#[tokio::test]
async fn unsupported_format_rejects_batch_before_segmentation() {
    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
    let inputs = vec![
        BatchInput::from_bytes("ok.png", png_bytes(2, 2)),
        BatchInput::from_bytes("anim.gif", vec![0x47, 0x49, 0x46]),
    ];

    let err = pipeline.run(&inputs, &mut MemorySink::new()).await.unwrap_err();
    assert!(matches!(err, NoBgError::UnsupportedFormat(_)));
    assert_eq!(err.category(), ErrorCategory::Configuration);
    drop(pipeline);
    assert_eq!(gateway.calls, 0);
}

#[tokio::test]
async fn colliding_output_names_are_rejected() {
    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
    let inputs = vec![
        BatchInput::from_bytes("photo.jpg", png_bytes(2, 2)),
        BatchInput::from_bytes("photo.png", png_bytes(2, 2)),
    ];

    let err = pipeline.run(&inputs, &mut MemorySink::new()).await.unwrap_err();
    assert!(matches!(err, NoBgError::NameCollision { .. }));
}

#[tokio::test]
async fn undecodable_bytes_fail_only_that_item() {
    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();
    let inputs = vec![
        BatchInput::from_bytes("broken.jpg", b"not an image".to_vec()),
        BatchInput::from_bytes("fine.png", png_bytes(2, 2)),
    ];

    let outcome = pipeline.run(&inputs, &mut MemorySink::new()).await.unwrap();
    assert_eq!(outcome.report.failed, 1);
    assert_eq!(outcome.report.failures[0].stage, ProcessingStage::Decode);
    assert_eq!(outcome.report.outputs, vec!["fine_noBg.png"]);
}

#[tokio::test]
async fn reader_input_is_gated_and_finished() {
    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();

    let item = finish_from_reader(Cursor::new(png_bytes(6, 2)), "upload.webp", &mut pipeline)
        .await
        .unwrap();
    assert_eq!(item.name(), "upload_noBg.png");
    let output = decode(item.bytes()).unwrap().to_rgba8();
    assert_eq!(output.dimensions(), (6, 2));
    assert_eq!(output.get_pixel(0, 0)[3], 0);
    assert_eq!(output.get_pixel(5, 1)[3], 255);

    let err = finish_from_reader(Cursor::new(png_bytes(2, 2)), "upload.gif", &mut pipeline)
        .await
        .unwrap_err();
    assert!(matches!(err, NoBgError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn traversal_names_stay_inside_output_dir() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("out");
    let mut sink = nobg::DirectorySink::create(&out).await.unwrap();
    let mut gateway = HalfGateway::default();
    let mut pipeline = FinishingPipeline::new(&mut gateway, PipelineConfig::default()).unwrap();

    let inputs = vec![BatchInput::from_bytes("../escape.png", png_bytes(2, 2))];
    let err = pipeline.run(&inputs, &mut sink).await.unwrap_err();

    assert!(matches!(err, NoBgError::InvalidConfig(_)));
    assert!(!temp_dir.path().join("escape_noBg.png").exists());
    assert!(sink.written().is_empty());
    drop(pipeline);
    assert_eq!(gateway.calls, 0);
}
